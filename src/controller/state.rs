use crate::suggestion::Suggestion;

/// Where a field is in its fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldPhase {
    #[default]
    Idle,
    /// Waiting for typing to settle
    Debouncing,
    Fetching,
    Populated,
    /// Fetch succeeded with nothing worth showing
    Empty,
    Errored,
}

/// Snapshot of one autocomplete field, published to whoever renders it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldState {
    pub search_term: String,
    pub suggestions: Vec<Suggestion>,
    pub phase: FieldPhase,
    pub error: Option<String>,
    /// Informational message, e.g. why no lookup happened
    pub status: Option<String>,
    pub selected_value: Option<String>,
}

impl FieldState {
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, FieldPhase::Debouncing | FieldPhase::Fetching)
    }

    pub(super) fn reset_results(&mut self, phase: FieldPhase) {
        self.suggestions.clear();
        self.error = None;
        self.status = None;
        self.phase = phase;
    }
}
