/// Resumable identity of a gateway connection.
///
/// Owned by the read loop; survives reconnects so a RESUME can be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    session_id: Option<String>,
    sequence: Option<u64>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            session_id: Some(session_id.into()),
            sequence: Some(sequence),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    /// Frames without a sequence number leave the last one in place.
    pub fn observe_sequence(&mut self, sequence: Option<u64>) {
        if let Some(seq) = sequence {
            self.sequence = Some(seq);
        }
    }

    pub fn establish(&mut self, session_id: String) {
        self.session_id = Some(session_id);
    }

    /// Both halves are needed to resume.
    pub fn resume_point(&self) -> Option<(&str, u64)> {
        match (&self.session_id, self.sequence) {
            (Some(id), Some(seq)) => Some((id.as_str(), seq)),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.session_id = None;
        self.sequence = None;
    }
}
