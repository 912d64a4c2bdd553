use crate::{AudioInfo, EditKind, PointId, TimeSignature};

/// Change notification sent after every successful edit.
#[derive(Debug, Clone, PartialEq)]
pub enum TimingEvent {
    PointInserted(PointId),
    PointMoved(PointId),
    BpmChanged(PointId),
    PointDeleted(PointId),
    SignatureChanged {
        measure_index: i64,
        signature: TimeSignature,
    },
    SignatureRemoved(i64),
    SignatureMoved {
        from: i64,
        to: i64,
    },
    Cleared,
    Undone(EditKind),
    Redone(EditKind),
    /// Both stores were replaced from a document.
    Loaded,
    AudioChanged(AudioInfo),
}

/// Receives [`TimingEvent`]s synchronously, after the engine state is
/// consistent again.
pub trait TimingObserver {
    fn timing_changed(&mut self, event: &TimingEvent);
}

impl<F> TimingObserver for F
where
    F: FnMut(&TimingEvent),
{
    fn timing_changed(&mut self, event: &TimingEvent) {
        self(event)
    }
}
