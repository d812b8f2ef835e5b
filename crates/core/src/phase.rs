//! Viewer lifecycle state machine

/// What the viewer can show right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewerPhase {
    /// No document; frames are clear-only.
    #[default]
    Empty,
    /// A document is open but the current page has no raster yet.
    Loading,
    /// The current page's raster has arrived; the page quad is drawn.
    Ready,
}

/// Something that happened to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseInput {
    /// A document opened and its sweep started.
    LoadStarted,
    /// Opening a document failed.
    LoadFailed,
    /// The current page's raster is present.
    CurrentPageReady,
    /// The current page's raster is not present (not arrived or failed).
    CurrentPageMissing,
    /// The document was closed.
    Closed,
}

impl ViewerPhase {
    /// Phase after `input`. Inputs that do not apply leave the phase as is.
    ///
    /// ```
    /// use pageview_core::{PhaseInput, ViewerPhase};
    ///
    /// let phase = ViewerPhase::Empty.next(PhaseInput::LoadStarted);
    /// assert_eq!(phase, ViewerPhase::Loading);
    /// assert_eq!(phase.next(PhaseInput::CurrentPageReady), ViewerPhase::Ready);
    /// ```
    pub fn next(self, input: PhaseInput) -> Self {
        use PhaseInput::*;
        use ViewerPhase::*;

        match (self, input) {
            (_, LoadStarted) => Loading,
            (_, LoadFailed) | (_, Closed) => Empty,
            (Loading, CurrentPageReady) => Ready,
            (Ready, CurrentPageMissing) => Loading,
            (phase, CurrentPageReady | CurrentPageMissing) => phase,
        }
    }

    pub fn has_document(self) -> bool {
        !matches!(self, ViewerPhase::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUTS: [PhaseInput; 5] = [
        PhaseInput::LoadStarted,
        PhaseInput::LoadFailed,
        PhaseInput::CurrentPageReady,
        PhaseInput::CurrentPageMissing,
        PhaseInput::Closed,
    ];

    #[test]
    fn test_initial_phase_is_empty() {
        assert_eq!(ViewerPhase::default(), ViewerPhase::Empty);
        assert!(!ViewerPhase::Empty.has_document());
    }

    #[test]
    fn test_load_cycle() {
        let phase = ViewerPhase::Empty.next(PhaseInput::LoadStarted);
        assert_eq!(phase, ViewerPhase::Loading);

        let phase = phase.next(PhaseInput::CurrentPageReady);
        assert_eq!(phase, ViewerPhase::Ready);

        // Switching to a page whose raster has not arrived.
        let phase = phase.next(PhaseInput::CurrentPageMissing);
        assert_eq!(phase, ViewerPhase::Loading);

        assert_eq!(phase.next(PhaseInput::Closed), ViewerPhase::Empty);
    }

    #[test]
    fn test_load_failed_always_empties() {
        for phase in [ViewerPhase::Empty, ViewerPhase::Loading, ViewerPhase::Ready] {
            assert_eq!(phase.next(PhaseInput::LoadFailed), ViewerPhase::Empty);
        }
    }

    #[test]
    fn test_reload_from_ready_goes_loading() {
        assert_eq!(ViewerPhase::Ready.next(PhaseInput::LoadStarted), ViewerPhase::Loading);
    }

    #[test]
    fn test_page_inputs_ignored_without_document() {
        assert_eq!(ViewerPhase::Empty.next(PhaseInput::CurrentPageReady), ViewerPhase::Empty);
        assert_eq!(ViewerPhase::Empty.next(PhaseInput::CurrentPageMissing), ViewerPhase::Empty);
    }

    #[test]
    fn test_document_phases_stay_document_phases() {
        for phase in [ViewerPhase::Loading, ViewerPhase::Ready] {
            for input in [PhaseInput::CurrentPageReady, PhaseInput::CurrentPageMissing] {
                assert!(phase.next(input).has_document());
            }
        }
        for input in INPUTS {
            let expected = input == PhaseInput::LoadStarted;
            assert_eq!(ViewerPhase::Empty.next(input).has_document(), expected, "{input:?}");
        }
    }
}
