use super::{SubjectCollector, SubjectSample};
use parking_lot::RwLock;

/// Latest active node pushed by an external editor over IPC.
#[derive(Debug, Default)]
pub struct ReportedSubject {
    latest: RwLock<Option<SubjectSample>>,
}

impl ReportedSubject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, sample: SubjectSample) {
        *self.latest.write() = Some(sample);
    }

    pub fn clear(&self) {
        *self.latest.write() = None;
    }
}

impl SubjectCollector for ReportedSubject {
    fn current_subject(&self) -> Option<SubjectSample> {
        self.latest.read().clone()
    }
}
