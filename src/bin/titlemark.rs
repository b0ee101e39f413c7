use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use titlemark::dom::{Dom, NodeId};
use titlemark::error::EditError;
use titlemark::modal::TitleModal;
use titlemark::richtext::convert;
use titlemark::richtext::document::{Block, Document, DocumentPosition, TextRun};
use titlemark::richtext::editor::{Editor, SharedEditor};
use titlemark::title_mark::{self, TitleMarkOptions, TITLE_ATTRIBUTE};
use titlemark::tooltip::{TooltipManager, TooltipOptions};
use titlemark::view::{render_saved_content, EditorView};

#[derive(Parser, Debug)]
#[command(name = "titlemark")]
#[command(about = "Interactive demo for hover-title annotations", long_about = None)]
struct Args {
    /// HTML file to load into the editor at startup
    file: Option<PathBuf>,

    /// TOML file with tooltip and wrapper options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Deserialize, Debug, Default)]
struct Config {
    #[serde(default)]
    tooltip: TooltipOptions,
    /// Extra attributes for every annotation wrapper span.
    #[serde(default)]
    wrapper_attributes: BTreeMap<String, String>,
}

impl Config {
    fn load(path: Option<&PathBuf>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn demo_document() -> Document {
    Document::from_blocks(vec![
        Block::heading(1).with_plain_text("Hover Title Demo"),
        Block::paragraph().with_plain_text("Hello World! 👋"),
        Block::paragraph()
            .with_run(TextRun::plain("Select some text and try the "))
            .with_run(TextRun::plain("Title feature").with_title("Annotations show on hover"))
            .with_run(TextRun::plain("!")),
    ])
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let config = Config::load(args.config.as_ref())?;

    let dom = Dom::new();
    let editor_el = dom.create_element("div");
    dom.set_attribute(editor_el, "id", "editor");
    dom.append_child(dom.root(), editor_el);
    let preview_el = dom.create_element("div");
    dom.set_attribute(preview_el, "id", "preview");
    dom.set_attribute(preview_el, "data-rendered-html", "");
    dom.append_child(dom.root(), preview_el);

    let document = match &args.file {
        Some(path) => {
            let html = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            convert::html_to_document(&html)
        }
        None => demo_document(),
    };

    let editor = Editor::shared(document);
    let modal = TitleModal::new();
    title_mark::attach_modal(&editor, &modal);

    let mark_options = TitleMarkOptions {
        html_attributes: config
            .wrapper_attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
    };
    let view = EditorView::mount(&dom, &editor, editor_el, mark_options.clone());

    let manager = TooltipManager::new();
    {
        // Mirror every update into the rendered section, the way a host
        // feeds its saved-content pane
        let dom_mirror = dom.clone();
        let manager_mirror = manager.clone();
        let tooltip_options = config.tooltip.clone();
        editor.borrow_mut().on_update(move |document| {
            let html = title_mark::render_html(document, &mark_options);
            render_saved_content(&dom_mirror, &manager_mirror, preview_el, &html, &tooltip_options);
        });
    }
    render_saved_content(&dom, &manager, preview_el, &view.html(), &config.tooltip);

    manager.subscribe(&dom, "#editor", &config.tooltip);
    manager.subscribe(&dom, "#preview", &config.tooltip);

    println!("titlemark demo (type 'help' for commands)");
    repl(&dom, &editor, &modal, &manager, &view, preview_el)
}

fn repl(
    dom: &Dom,
    editor: &SharedEditor,
    modal: &TitleModal,
    manager: &TooltipManager,
    view: &EditorView,
    preview: NodeId,
) -> Result<()> {
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        match cmd {
            "help" => print_help(),
            "quit" | "exit" => return Ok(()),
            "select" => cmd_select(editor, rest),
            "unselect" => editor.borrow_mut().clear_selection(),
            "text" => println!("{}", editor.borrow().document()),
            "html" => println!("{}", view.html()),
            "preview" => println!("{}", dom.inner_html(preview)),
            "title" => cmd_title(editor, modal),
            "input" => modal.set_input(rest),
            "labels" => cmd_labels(modal),
            "save" => modal.save(),
            "cancel" => modal.close(),
            "set" => report(editor.borrow_mut().set_title(rest)),
            "toggle" => report(editor.borrow_mut().toggle_title(rest)),
            "unset" => editor.borrow_mut().unset_title(),
            "insert" => cmd_insert(editor, rest),
            "delete" => cmd_delete(editor, rest),
            "load" => cmd_load(view, rest),
            "widgets" => cmd_widgets(dom, manager),
            "enter" => with_element(rest, |el| manager.pointer_enter(dom, el)),
            "leave" => with_element(rest, |el| manager.pointer_leave(dom, el, None)),
            "click" => with_element(rest, |el| manager.click(dom, el)),
            "show" => with_element(rest, |el| manager.show(dom, el)),
            "hide" => with_element(rest, |el| manager.hide(dom, el)),
            _ => println!("unknown command: {cmd} (try 'help')"),
        }
    }
}

fn report(result: Result<(), EditError>) {
    if let Err(EditError::SelectionRequired) = result {
        println!("Please select some text first!");
    }
}

fn cmd_select(editor: &SharedEditor, rest: &str) {
    let parts: Vec<usize> = rest
        .split_whitespace()
        .filter_map(|p| p.parse().ok())
        .collect();
    match parts.as_slice() {
        [start, end] => editor.borrow_mut().set_selection(
            DocumentPosition::new(0, *start),
            DocumentPosition::new(0, *end),
        ),
        [start_block, start, end_block, end] => editor.borrow_mut().set_selection(
            DocumentPosition::new(*start_block, *start),
            DocumentPosition::new(*end_block, *end),
        ),
        _ => {
            println!("usage: select <start> <end>  |  select <start-block> <start> <end-block> <end>");
            return;
        }
    }
    if let Some(text) = editor.borrow().selected_text() {
        println!("selected: {text:?}");
    }
}

fn cmd_title(editor: &SharedEditor, modal: &TitleModal) {
    match title_mark::open_title_modal(&editor.borrow(), modal) {
        Ok(()) => {
            println!("{}", modal.heading());
            println!("Enter a title for the selected text :");
            println!("[input {:?}] [save button: {}]", modal.input(), modal.save_label());
        }
        Err(EditError::SelectionRequired) => println!("Please select some text first!"),
    }
}

fn cmd_labels(modal: &TitleModal) {
    if modal.is_open() {
        println!(
            "{} | input {:?} | save button: {}",
            modal.heading(),
            modal.input(),
            modal.save_label()
        );
    } else {
        println!("modal closed");
    }
}

fn cmd_insert(editor: &SharedEditor, rest: &str) {
    let mut parts = rest.splitn(3, ' ');
    let block = parts.next().and_then(|p| p.parse::<usize>().ok());
    let offset = parts.next().and_then(|p| p.parse::<usize>().ok());
    let (Some(block), Some(offset), Some(text)) = (block, offset, parts.next()) else {
        println!("usage: insert <block> <offset> <text>");
        return;
    };
    editor
        .borrow_mut()
        .insert_text(DocumentPosition::new(block, offset), text);
}

fn cmd_delete(editor: &SharedEditor, rest: &str) {
    let parts: Vec<usize> = rest
        .split_whitespace()
        .filter_map(|p| p.parse().ok())
        .collect();
    match parts.as_slice() {
        [start, end] => editor.borrow_mut().delete_range(
            DocumentPosition::new(0, *start),
            DocumentPosition::new(0, *end),
        ),
        [start_block, start, end_block, end] => editor.borrow_mut().delete_range(
            DocumentPosition::new(*start_block, *start),
            DocumentPosition::new(*end_block, *end),
        ),
        _ => println!("usage: delete <start> <end>  |  delete <start-block> <start> <end-block> <end>"),
    }
}

fn cmd_load(view: &EditorView, rest: &str) {
    match fs::read_to_string(rest.trim()) {
        Ok(html) => view.set_html(&html),
        Err(err) => println!("could not read {}: {err}", rest.trim()),
    }
}

fn cmd_widgets(dom: &Dom, manager: &TooltipManager) {
    let elements = manager.annotated_elements();
    if elements.is_empty() {
        println!("(no widgets)");
        return;
    }
    for element in elements {
        let title = dom.attribute(element, TITLE_ATTRIBUTE).unwrap_or_default();
        let state = if manager.is_visible(element) {
            "visible"
        } else {
            "hidden"
        };
        println!(
            "#{element} {:?} title={title:?} [{state}]",
            dom.text_content(element)
        );
    }
}

fn with_element(rest: &str, action: impl FnOnce(NodeId)) {
    match rest.trim().parse() {
        Ok(element) => action(element),
        Err(_) => println!("expected an element id (see 'widgets')"),
    }
}

fn print_help() {
    println!("document:");
    println!("  text                         plain text of the document");
    println!("  html                         editor container HTML");
    println!("  preview                      rendered section HTML");
    println!("  load <file>                  replace the document from an HTML file");
    println!("  insert <block> <off> <text>  insert text at a position");
    println!("  delete <start> <end>         delete a range (4-arg form crosses blocks)");
    println!("selection:");
    println!("  select <start> <end>         select characters in block 0");
    println!("  select <b> <off> <b> <off>   select across blocks");
    println!("  unselect                     drop the selection");
    println!("annotations:");
    println!("  title                        open the title dialog for the selection");
    println!("  input <text>                 type into the dialog");
    println!("  labels                       show dialog heading and button label");
    println!("  save | cancel                close the dialog, saving or not");
    println!("  set <text> | toggle <text>   annotate directly");
    println!("  unset                        remove annotations from the selection");
    println!("tooltips:");
    println!("  widgets                      list widgets and their state");
    println!("  enter|leave|click <id>       simulate pointer events on an element");
    println!("  show|hide <id>               force a widget on or off");
    println!("  quit");
}
