use super::*;

#[test]
fn error_codes_are_distinct() {
    let errors = [
        ClientError::Auth("x".into()),
        ClientError::Validation("x".into()),
        ClientError::Network("x".into()),
        ClientError::Status { status: 500, body: String::new() },
        ClientError::Decode("x".into()),
        ClientError::Store(StoreError::Io("x".into())),
        ClientError::Config("x".into()),
        ClientError::HttpClientBuild("x".into()),
    ];
    let mut codes: Vec<&str> = errors.iter().map(ClientError::error_code).collect();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), errors.len());
}

#[test]
fn auth_errors_request_sign_in() {
    assert!(ClientError::Auth("refresh failed".into()).is_auth());
    assert!(ClientError::Status { status: 401, body: String::new() }.is_auth());
    assert!(!ClientError::Status { status: 403, body: String::new() }.is_auth());
    assert!(!ClientError::Network("connection refused".into()).is_auth());
}

#[test]
fn reason_strips_variant_prefix() {
    let err = ClientError::Auth("no refresh token".into());
    assert_eq!(err.reason(), "no refresh token");
    assert_eq!(err.to_string(), "authentication failed: no refresh token");
}

#[test]
fn store_error_converts() {
    let err: ClientError = StoreError::Serialize("bad json".into()).into();
    assert_eq!(err.error_code(), "E_STORE");
}
