use uuid::Uuid;

/// Single-use secret proving the callback-endpoint owner initiated the
/// subscription. Generated fresh for every attempt, discarded once the
/// handshake completes or fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyToken(String);

impl VerifyToken {
    /// Random UUID v4 gives 122 bits of entropy; uniqueness across calls
    /// holds with overwhelming probability. Failure to obtain OS randomness
    /// aborts the process, which is the only safe outcome.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
