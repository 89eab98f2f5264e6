//! Cookie store + session provider, without network access.

use std::path::PathBuf;

use kizzy::config::KizzyConfig;
use kizzy::platforms::kizzy::CookieSessionProvider;
use kizzy::platforms::{KizzyApi, SessionProvider};
use kizzy::storage::{CookieStore, StoredCookie};
use kizzy::types::{Account, BetError, KizzyError, PoolSide};
use rust_decimal_macros::dec;

fn temp_store() -> CookieStore {
    let mut dir = std::env::temp_dir();
    dir.push(format!("kizzy_it_cookies_{}", uuid::Uuid::new_v4()));
    CookieStore::new(dir)
}

fn session_cookie() -> StoredCookie {
    StoredCookie {
        name: "session".into(),
        value: "abc123".into(),
        domain: Some(".kizzy.io".into()),
        path: Some("/".into()),
        expiry: None,
    }
}

#[tokio::test]
async fn test_provider_opens_stored_account() {
    let store = temp_store();
    store.save("alice", &[session_cookie()]).unwrap();
    let account = store.accounts().unwrap().remove(0);
    assert_eq!(account.index, 1);

    let provider = CookieSessionProvider::new(store.clone(), KizzyConfig::default());
    let session = provider.open(&account).await.unwrap();
    session.close().await;
    assert_eq!(
        session.place_pool_bet(1, PoolSide::Long, dec!(15)).await,
        Err(BetError::SessionClosed)
    );

    std::fs::remove_dir_all(store.dir()).unwrap();
}

#[tokio::test]
async fn test_provider_distinguishes_missing_from_corrupt() {
    let store = temp_store();
    let provider = CookieSessionProvider::new(store.clone(), KizzyConfig::default());

    let ghost = Account {
        index: 1,
        name: "ghost".into(),
        cookie_path: store.dir().join("ghost.json"),
    };
    assert!(matches!(
        provider.open(&ghost).await,
        Err(KizzyError::NoCookies { .. })
    ));

    std::fs::create_dir_all(store.dir()).unwrap();
    let broken: PathBuf = store.dir().join("broken.json");
    std::fs::write(&broken, "{ not a cookie list").unwrap();
    let account = Account {
        index: 1,
        name: "broken".into(),
        cookie_path: broken,
    };
    assert!(matches!(
        provider.open(&account).await,
        Err(KizzyError::SessionAuthFailure { .. })
    ));

    std::fs::remove_dir_all(store.dir()).unwrap();
}
