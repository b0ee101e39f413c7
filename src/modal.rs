// Title Modal Controller
// State machine for the add/edit title dialog. Owns no UI: hosts bind
// their input events to `set_input`, Enter to `save`, and Escape, Cancel
// and outside clicks to `close`, and read the labels back per keystroke.

use std::cell::RefCell;
use std::rc::Rc;

type SaveHandler = Box<dyn FnMut(String)>;

#[derive(Default)]
struct ModalState {
    is_open: bool,
    /// Edit framing, fixed at open time: the modal was opened over an
    /// existing (non-empty) title.
    editing: bool,
    current_title: String,
    input: String,
    on_save: Option<SaveHandler>,
}

/// Shared handle to the modal controller. Clones see the same session and
/// the same registered save handler.
#[derive(Clone, Default)]
pub struct TitleModal {
    state: Rc<RefCell<ModalState>>,
}

impl TitleModal {
    pub fn new() -> Self {
        TitleModal::default()
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().is_open
    }

    /// The title the modal was opened with.
    pub fn current_title(&self) -> String {
        self.state.borrow().current_title.clone()
    }

    /// Live input value.
    pub fn input(&self) -> String {
        self.state.borrow().input.clone()
    }

    /// Open over `initial` (empty for a fresh annotation). Opening while
    /// already open resets the session in place.
    pub fn open(&self, initial: &str) {
        let mut state = self.state.borrow_mut();
        state.is_open = true;
        state.editing = !initial.is_empty();
        state.current_title = initial.to_string();
        state.input = initial.to_string();
        tracing::debug!(editing = state.editing, "title modal opened");
    }

    /// Discard edits and close. The save handler stays registered.
    pub fn close(&self) {
        let mut state = self.state.borrow_mut();
        state.is_open = false;
        state.editing = false;
        state.current_title.clear();
        state.input.clear();
    }

    /// Per-keystroke input update. Ignored while closed.
    pub fn set_input(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        if !state.is_open {
            return;
        }
        state.input = text.to_string();
    }

    /// Dialog heading for the current session.
    pub fn heading(&self) -> &'static str {
        if self.state.borrow().editing {
            "Edit Title"
        } else {
            "Add Title"
        }
    }

    /// Save button label, recomputed from live state: adding stays "Add
    /// Title"; editing reads "Update Title" until the input is blanked,
    /// then "Remove Title".
    pub fn save_label(&self) -> &'static str {
        let state = self.state.borrow();
        if !state.editing {
            "Add Title"
        } else if state.input.trim().is_empty() {
            "Remove Title"
        } else {
            "Update Title"
        }
    }

    /// Hand the raw, untrimmed input to the save handler, then close.
    /// Trimming and empty-means-remove are the receiver's policy. Without
    /// a handler the input is dropped with a warning; a closed modal
    /// ignores the call entirely.
    pub fn save(&self) {
        let (input, handler) = {
            let mut state = self.state.borrow_mut();
            if !state.is_open {
                return;
            }
            (state.input.clone(), state.on_save.take())
        };
        match handler {
            Some(mut handler) => {
                handler(input);
                // A handler registered during the call wins the slot
                let mut state = self.state.borrow_mut();
                if state.on_save.is_none() {
                    state.on_save = Some(handler);
                }
            }
            None => tracing::warn!("no save handler registered; title input dropped"),
        }
        self.close();
    }

    /// Register the save handler. The most recent registration wins.
    pub fn set_save_handler(&self, handler: impl FnMut(String) + 'static) {
        self.state.borrow_mut().on_save = Some(Box::new(handler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_picks_framing_from_initial() {
        let modal = TitleModal::new();
        modal.open("");
        assert_eq!(modal.heading(), "Add Title");
        assert_eq!(modal.save_label(), "Add Title");

        modal.open("existing");
        assert_eq!(modal.heading(), "Edit Title");
        assert_eq!(modal.save_label(), "Update Title");
        assert_eq!(modal.input(), "existing");
        assert_eq!(modal.current_title(), "existing");
    }

    #[test]
    fn test_blank_initial_counts_as_editing() {
        // A title of only spaces exists, so the session is an edit, but
        // the trimmed-empty input reads as removal
        let modal = TitleModal::new();
        modal.open("   ");
        assert_eq!(modal.heading(), "Edit Title");
        assert_eq!(modal.save_label(), "Remove Title");
    }

    #[test]
    fn test_save_label_tracks_keystrokes() {
        let modal = TitleModal::new();
        modal.open("note");
        assert_eq!(modal.save_label(), "Update Title");
        modal.set_input("");
        assert_eq!(modal.save_label(), "Remove Title");
        modal.set_input("n");
        assert_eq!(modal.save_label(), "Update Title");
    }

    #[test]
    fn test_create_framing_label_never_changes() {
        let modal = TitleModal::new();
        modal.open("");
        modal.set_input("typed something");
        assert_eq!(modal.save_label(), "Add Title");
        modal.set_input("");
        assert_eq!(modal.save_label(), "Add Title");
    }

    #[test]
    fn test_reopen_resets_session() {
        let modal = TitleModal::new();
        modal.open("first");
        modal.set_input("edited");
        modal.open("second");
        assert_eq!(modal.input(), "second");
        assert!(modal.is_open());
    }

    #[test]
    fn test_save_passes_raw_input_and_closes() {
        let modal = TitleModal::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_cb = Rc::clone(&seen);
        modal.set_save_handler(move |title| seen_cb.borrow_mut().push(title));

        modal.open("");
        modal.set_input("  spaced  ");
        modal.save();
        assert_eq!(*seen.borrow(), vec!["  spaced  ".to_string()]);
        assert!(!modal.is_open());
        assert_eq!(modal.input(), "");
    }

    #[test]
    fn test_save_without_handler_still_closes() {
        let modal = TitleModal::new();
        modal.open("note");
        modal.save();
        assert!(!modal.is_open());
    }

    #[test]
    fn test_save_when_closed_is_noop() {
        let modal = TitleModal::new();
        let calls = Rc::new(RefCell::new(0));
        let calls_cb = Rc::clone(&calls);
        modal.set_save_handler(move |_| *calls_cb.borrow_mut() += 1);
        modal.save();
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_close_keeps_handler() {
        let modal = TitleModal::new();
        let calls = Rc::new(RefCell::new(0));
        let calls_cb = Rc::clone(&calls);
        modal.set_save_handler(move |_| *calls_cb.borrow_mut() += 1);

        modal.open("a");
        modal.close();
        modal.open("b");
        modal.save();
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_latest_handler_wins() {
        let modal = TitleModal::new();
        let first = Rc::new(RefCell::new(0));
        let second = Rc::new(RefCell::new(0));
        let first_cb = Rc::clone(&first);
        let second_cb = Rc::clone(&second);
        modal.set_save_handler(move |_| *first_cb.borrow_mut() += 1);
        modal.set_save_handler(move |_| *second_cb.borrow_mut() += 1);

        modal.open("x");
        modal.save();
        assert_eq!(*first.borrow(), 0);
        assert_eq!(*second.borrow(), 1);
    }

    #[test]
    fn test_handler_registered_during_save_wins() {
        let modal = TitleModal::new();
        let replacement_calls = Rc::new(RefCell::new(0));

        let modal_inner = modal.clone();
        let replacement_calls_cb = Rc::clone(&replacement_calls);
        modal.set_save_handler(move |_| {
            let replacement_calls_inner = Rc::clone(&replacement_calls_cb);
            modal_inner.set_save_handler(move |_| {
                *replacement_calls_inner.borrow_mut() += 1;
            });
        });

        modal.open("x");
        modal.save();
        assert_eq!(*replacement_calls.borrow(), 0);
        modal.open("y");
        modal.save();
        assert_eq!(*replacement_calls.borrow(), 1);
    }

    #[test]
    fn test_set_input_when_closed_is_ignored() {
        let modal = TitleModal::new();
        modal.set_input("typed into nothing");
        assert_eq!(modal.input(), "");
    }
}
