use super::*;

use shared::{error::ApiError, protocol::LoginResponse};

use crate::error::ClientError;

enum AuthReply {
    Accept,
    Reject(Option<&'static str>),
}

struct FakeAuth {
    login: AuthReply,
    register: AuthReply,
}

impl FakeAuth {
    fn accepting() -> Arc<Self> {
        Arc::new(Self {
            login: AuthReply::Accept,
            register: AuthReply::Accept,
        })
    }

    fn rejecting(message: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            login: AuthReply::Reject(message),
            register: AuthReply::Reject(message),
        })
    }
}

fn rejection(message: Option<&'static str>) -> ClientError {
    match message {
        Some(message) => ApiError::from_status(401, Some(message.to_string())).into(),
        None => ClientError::Unavailable("connection refused".to_string()),
    }
}

#[async_trait]
impl AuthService for FakeAuth {
    async fn login(&self, username: &str, _password: &str) -> Result<LoginResponse, ClientError> {
        match self.login {
            AuthReply::Accept => Ok(LoginResponse {
                access_token: format!("token-for-{username}"),
                username: username.to_string(),
            }),
            AuthReply::Reject(message) => Err(rejection(message)),
        }
    }

    async fn register(&self, _username: &str, _password: &str) -> Result<(), ClientError> {
        match self.register {
            AuthReply::Accept => Ok(()),
            AuthReply::Reject(message) => Err(rejection(message)),
        }
    }
}

#[tokio::test]
async fn empty_store_starts_signed_out() {
    let session = SessionContext::init_from_store(MemorySessionStore::new(), FakeAuth::accepting())
        .await
        .expect("init");

    assert!(!session.is_authenticated());
    assert!(matches!(
        session.require_session(),
        Err(AuthError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn stored_credential_is_restored_on_init() {
    let store = MemorySessionStore::new();
    store.set(TOKEN_KEY, "tok-1").await.expect("token");
    store.set(USERNAME_KEY, "asha").await.expect("username");

    let session = SessionContext::init_from_store(store, FakeAuth::accepting())
        .await
        .expect("init");

    assert_eq!(
        session.current(),
        Some(&Session {
            token: "tok-1".to_string(),
            username: "asha".to_string(),
        })
    );
}

#[tokio::test]
async fn login_persists_and_logout_clears() {
    let store = MemorySessionStore::new();
    let mut session = SessionContext::init_from_store(store.clone(), FakeAuth::accepting())
        .await
        .expect("init");

    let signed_in = session.login("asha", "pw").await.expect("login").clone();
    assert_eq!(signed_in.token, "token-for-asha");
    assert_eq!(
        store.get(TOKEN_KEY).await.expect("read"),
        Some("token-for-asha".to_string())
    );
    assert_eq!(
        store.get(USERNAME_KEY).await.expect("read"),
        Some("asha".to_string())
    );

    let restored = SessionContext::init_from_store(store.clone(), FakeAuth::accepting())
        .await
        .expect("re-init");
    assert_eq!(restored.current(), Some(&signed_in));

    session.logout().await.expect("logout");
    assert!(!session.is_authenticated());
    assert_eq!(store.get(TOKEN_KEY).await.expect("read"), None);
    assert_eq!(store.get(USERNAME_KEY).await.expect("read"), None);
}

#[tokio::test]
async fn rejected_login_keeps_previous_state_and_reports_message() {
    for (message, expected) in [
        (Some("Invalid credentials"), "Invalid credentials"),
        (None, "Failed to login"),
    ] {
        let store = MemorySessionStore::new();
        let mut session = SessionContext::init_from_store(store.clone(), FakeAuth::rejecting(message))
            .await
            .expect("init");

        let err = session.login("asha", "bad").await.expect_err("rejected");

        assert_eq!(err.to_string(), expected);
        assert!(!session.is_authenticated());
        assert_eq!(store.get(TOKEN_KEY).await.expect("read"), None);
    }
}

#[tokio::test]
async fn register_failure_uses_generic_fallback() {
    let session = SessionContext::init_from_store(MemorySessionStore::new(), FakeAuth::rejecting(None))
        .await
        .expect("init");
    let err = session.register("ravi", "pw").await.expect_err("rejected");
    assert_eq!(err.to_string(), "Failed to register");

    let session = SessionContext::init_from_store(MemorySessionStore::new(), FakeAuth::accepting())
        .await
        .expect("init");
    session.register("ravi", "pw").await.expect("registered");
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn durable_store_keeps_sign_in_across_reopen() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("planner_session_{suffix}"));
    let database_url = format!("sqlite://{}", dir.join("session.db").display());

    {
        let store = crate::session_store::DurableSessionStore::initialize(&database_url)
            .await
            .expect("open store");
        let mut session = SessionContext::init_from_store(store, FakeAuth::accepting())
            .await
            .expect("init");
        session.login("asha", "pw").await.expect("login");
    }

    let store = crate::session_store::DurableSessionStore::initialize(&database_url)
        .await
        .expect("reopen store");
    let session = SessionContext::init_from_store(store, FakeAuth::accepting())
        .await
        .expect("init");
    assert_eq!(
        session.current().map(|s| s.username.as_str()),
        Some("asha")
    );

    let _ = std::fs::remove_dir_all(dir);
}
