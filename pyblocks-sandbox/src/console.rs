//! Console - output region, input prompts and the run button

use pyblocks_common::{
    escape_html, ButtonLabel, ButtonView, ConsoleEntry, ConsoleEvent, PromptId, PromptView,
    StatusMarkup,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, oneshot};

/// Question asked before clearing a non-empty console
pub const CLEAR_CONFIRMATION: &str = "Are you sure you want to clear the console?";

const EVENT_CAPACITY: usize = 256;

/// Yes/no confirmation supplied by the front end
pub trait Confirm {
    fn confirm(&self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Default)]
struct ConsoleInner {
    entries: Vec<ConsoleEntry>,
    /// Prompts still awaiting submission, keyed by their own id
    pending: HashMap<PromptId, oneshot::Sender<String>>,
    next_prompt: u64,
    button: ButtonView,
}

impl ConsoleInner {
    fn prompt_mut(&mut self, id: PromptId) -> Option<&mut PromptView> {
        self.entries.iter_mut().find_map(|entry| match entry {
            ConsoleEntry::Prompt(view) if view.id == id => Some(view),
            _ => None,
        })
    }
}

/// Shared output region plus the run button it sits next to
///
/// Cloning yields another handle to the same console.
#[derive(Clone)]
pub struct Console {
    inner: Arc<Mutex<ConsoleInner>>,
    events: broadcast::Sender<ConsoleEvent>,
}

impl Console {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(ConsoleInner::default())),
            events,
        }
    }

    /// Receive every change made to the console from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: ConsoleEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Append program output or any other untrusted text
    pub fn append(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let entry = ConsoleEntry::Text(text.to_string());
        self.lock().entries.push(entry.clone());
        self.emit(ConsoleEvent::Appended(entry));
    }

    /// Append internally generated status markup
    pub fn append_markup(&self, markup: StatusMarkup) {
        let entry = ConsoleEntry::Markup(markup);
        self.lock().entries.push(entry.clone());
        self.emit(ConsoleEvent::Appended(entry));
    }

    /// Render a new input prompt; the receiver resolves when it is submitted
    pub fn open_prompt(&self) -> (PromptId, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        let view = {
            let mut inner = self.lock();
            inner.next_prompt += 1;
            let id = PromptId(inner.next_prompt);
            let view = PromptView::pending(id);
            inner.entries.push(ConsoleEntry::Prompt(view.clone()));
            inner.pending.insert(id, tx);
            view
        };
        let id = view.id;
        self.emit(ConsoleEvent::Appended(ConsoleEntry::Prompt(view)));
        (id, rx)
    }

    /// Submit a value to a prompt
    ///
    /// Returns false if the prompt is not awaiting input (already submitted,
    /// abandoned, or unknown). The prompt stops being interactive immediately.
    pub fn submit(&self, id: PromptId, value: impl Into<String>) -> bool {
        let value = value.into();
        let (sender, view) = {
            let mut inner = self.lock();
            let Some(sender) = inner.pending.remove(&id) else {
                return false;
            };
            let view = inner.prompt_mut(id).map(|view| {
                view.value = Some(value.clone());
                view.input_enabled = false;
                view.submit_enabled = false;
                view.clone()
            });
            (sender, view)
        };
        if let Some(view) = view {
            self.emit(ConsoleEvent::PromptUpdated(view));
        }
        if sender.send(value).is_err() {
            tracing::debug!(prompt_id = %id, "Prompt submitted after its waiter went away");
        }
        true
    }

    /// Most recently opened prompt that is still awaiting input
    pub fn latest_pending_prompt(&self) -> Option<PromptId> {
        self.lock().pending.keys().max().copied()
    }

    pub fn pending_prompt_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Disable every prompt still awaiting input; their waiters never resolve
    pub fn abandon_prompts(&self) -> usize {
        let views: Vec<PromptView> = {
            let mut inner = self.lock();
            let ids: Vec<PromptId> = inner.pending.drain().map(|(id, _)| id).collect();
            ids.into_iter()
                .filter_map(|id| {
                    inner.prompt_mut(id).map(|view| {
                        view.input_enabled = false;
                        view.submit_enabled = false;
                        view.clone()
                    })
                })
                .collect()
        };
        let count = views.len();
        for view in views {
            self.emit(ConsoleEvent::PromptUpdated(view));
        }
        count
    }

    /// Whether clearing needs the user's confirmation first
    pub fn needs_clear_confirmation(&self, run_active: bool) -> bool {
        run_active || !self.lock().entries.is_empty()
    }

    /// Empty the output region, asking first if it has content or a run is
    /// active. Returns false if the user declined.
    ///
    /// Prompts still awaiting input stay submittable by id.
    pub fn clear(&self, confirm: &dyn Confirm, run_active: bool) -> bool {
        if self.needs_clear_confirmation(run_active) && !confirm.confirm(CLEAR_CONFIRMATION) {
            return false;
        }
        self.lock().entries.clear();
        self.emit(ConsoleEvent::Cleared);
        true
    }

    pub fn entries(&self) -> Vec<ConsoleEntry> {
        self.lock().entries.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn prompt(&self, id: PromptId) -> Option<PromptView> {
        self.lock().prompt_mut(id).cloned()
    }

    pub fn button(&self) -> ButtonView {
        self.lock().button
    }

    pub fn set_button(&self, label: ButtonLabel, enabled: bool) {
        let view = ButtonView { label, enabled };
        {
            let mut inner = self.lock();
            if inner.button == view {
                return;
            }
            inner.button = view;
        }
        self.emit(ConsoleEvent::ButtonChanged(view));
    }

    /// Plain-text rendering of the output region
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        for entry in self.lock().entries.iter() {
            match entry {
                ConsoleEntry::Text(text) => out.push_str(text),
                ConsoleEntry::Markup(markup) => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(&markup.to_plain());
                }
                ConsoleEntry::Prompt(view) => {
                    out.push_str(&format!(
                        "[{}] {}\n",
                        if view.is_interactive() { "input" } else { "closed" },
                        view.value.as_deref().unwrap_or("")
                    ));
                }
            }
        }
        out
    }

    /// HTML rendering of the output region; program text is escaped
    pub fn render_html(&self) -> String {
        let mut out = String::new();
        for entry in self.lock().entries.iter() {
            match entry {
                ConsoleEntry::Text(text) => out.push_str(&escape_html(text)),
                ConsoleEntry::Markup(markup) => out.push_str(&markup.to_html()),
                ConsoleEntry::Prompt(view) => {
                    let disabled = |enabled: bool| if enabled { "" } else { " disabled" };
                    out.push_str(&format!(
                        "<textarea class=\"userInput\" data-prompt=\"{}\"{}>{}</textarea>",
                        view.id.0,
                        disabled(view.input_enabled),
                        escape_html(view.value.as_deref().unwrap_or(""))
                    ));
                    out.push_str(&format!(
                        "<button class=\"submitButton\" data-prompt=\"{}\"{}>Submit</button><br>",
                        view.id.0,
                        disabled(view.submit_enabled)
                    ));
                }
            }
        }
        out
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
