use crate::{
    error::Error,
    models::{ChallengeRequest, ChallengeResponse},
};

impl ChallengeRequest {
    /// Parse the provider's verification GET from its raw query string.
    /// All three `hub.*` parameters must be present.
    pub fn from_query(query: &str) -> Result<Self, Error> {
        let mut mode = None;
        let mut challenge = None;
        let mut verify_token = None;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "hub.mode" => mode = Some(value.into_owned()),
                "hub.challenge" => challenge = Some(value.into_owned()),
                "hub.verify_token" => verify_token = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(Self {
            mode: mode.ok_or(Error::MalformedRequest("hub.mode missing"))?,
            challenge: challenge.ok_or(Error::MalformedRequest("hub.challenge missing"))?,
            verify_token: verify_token.ok_or(Error::MalformedRequest("hub.verify_token missing"))?,
        })
    }
}

/// Check the inbound verify token against the one we are holding and build
/// the echo body. Does no I/O, so the provider's 2-second response deadline
/// is spent entirely in the HTTP layer.
pub fn validate(request: &ChallengeRequest, expected_token: &str) -> Result<ChallengeResponse, Error> {
    if !constant_time_eq(&request.verify_token, expected_token) {
        return Err(Error::TokenMismatch);
    }
    Ok(ChallengeResponse {
        challenge: request.challenge.clone(),
    })
}

// The token is short-lived, but the comparison is cheap to do in constant
// time, so avoid leaking a prefix length through timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        diff |= byte_a ^ byte_b;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY: &str =
        "hub.verify_token=STRAVA&hub.challenge=15f7d1a91c1f40f8a748fd134752feb3&hub.mode=subscribe";

    #[test]
    fn parses_all_hub_parameters() {
        let request = ChallengeRequest::from_query(QUERY).unwrap();
        assert_eq!(request.mode, "subscribe");
        assert_eq!(request.challenge, "15f7d1a91c1f40f8a748fd134752feb3");
        assert_eq!(request.verify_token, "STRAVA");
    }

    #[test]
    fn rejects_query_missing_mode() {
        let err = ChallengeRequest::from_query(
            "hub.verify_token=STRAVA&hub.challenge=abc",
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedRequest("hub.mode missing")));
    }

    #[test]
    fn rejects_query_missing_challenge() {
        let err =
            ChallengeRequest::from_query("hub.verify_token=STRAVA&hub.mode=subscribe").unwrap_err();
        assert!(matches!(err, Error::MalformedRequest("hub.challenge missing")));
    }

    #[test]
    fn rejects_query_missing_verify_token() {
        let err =
            ChallengeRequest::from_query("hub.challenge=abc&hub.mode=subscribe").unwrap_err();
        assert!(matches!(err, Error::MalformedRequest("hub.verify_token missing")));
    }

    #[test]
    fn matching_token_echoes_challenge() {
        let request = ChallengeRequest::from_query(QUERY).unwrap();
        let response = validate(&request, "STRAVA").unwrap();
        assert_eq!(response.challenge, "15f7d1a91c1f40f8a748fd134752feb3");
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"hub.challenge":"15f7d1a91c1f40f8a748fd134752feb3"}"#
        );
    }

    #[test]
    fn mismatched_token_is_rejected_without_echo() {
        let request = ChallengeRequest::from_query(QUERY).unwrap();
        let err = validate(&request, "OTHER").unwrap_err();
        assert!(matches!(err, Error::TokenMismatch));
    }

    #[test]
    fn constant_time_eq_handles_lengths_and_content() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
