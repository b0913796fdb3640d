use secstore_core::db::open_db_in_memory;
use secstore_core::{
    MappingKey, Privilege, RecordStore, Role, StoreError, User, UserRoleMapping, VersionToken,
};

#[test]
fn add_assigns_initial_version_and_read_returns_it() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordStore::<User>::new();

    let mut user = User::new("alice");
    user.email = "alice@example.org".to_string();
    // Caller versions are ignored on insert.
    user.version = Some("41".parse().unwrap());
    assert_eq!(store.add(&conn, &user).unwrap(), VersionToken::INITIAL);

    let loaded = store.read(&conn, &"alice".to_string()).unwrap().unwrap();
    assert_eq!(loaded.email, "alice@example.org");
    assert_eq!(loaded.version, Some(VersionToken::INITIAL));
}

#[test]
fn read_of_missing_record_is_none() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordStore::<Privilege>::new();

    assert!(store.read(&conn, &"absent".to_string()).unwrap().is_none());
    assert!(store.read_raw(&conn, &"absent".to_string()).unwrap().is_none());
}

#[test]
fn add_existing_identity_is_duplicate_key() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordStore::<Role>::new();
    store.add(&conn, &Role::new("dev", "Developers")).unwrap();

    let err = store.add(&conn, &Role::new("dev", "Other")).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { ref key, .. } if key == "dev"));
    let stored = store.read(&conn, &"dev".to_string()).unwrap().unwrap();
    assert_eq!(stored.name, "Developers");
}

#[test]
fn every_write_advances_version_by_one() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordStore::<Role>::new();
    store.add(&conn, &Role::new("ops", "Operations")).unwrap();
    let key = "ops".to_string();

    let mut previous = VersionToken::INITIAL;
    for round in 0..3 {
        let handle = store.read_raw(&conn, &key).unwrap().unwrap();
        assert_eq!(handle.version(), previous);

        let mut role = store.read(&conn, &key).unwrap().unwrap();
        role.description = format!("round {round}");
        let written = store.write(&conn, &handle, &role).unwrap();
        assert!(written > previous);
        previous = written;
    }

    let stored = store.read(&conn, &key).unwrap().unwrap();
    assert_eq!(stored.version, Some(previous));
    assert_eq!(stored.description, "round 2");
}

#[test]
fn write_after_delete_is_concurrent_modification() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordStore::<Role>::new();
    let role = Role::new("temp", "Temporary");
    store.add(&conn, &role).unwrap();

    let handle = store.read_raw(&conn, &"temp".to_string()).unwrap().unwrap();
    assert!(store.delete(&conn, &"temp".to_string()).unwrap());

    let err = store.write(&conn, &handle, &role).unwrap_err();
    assert!(matches!(err, StoreError::ConcurrentModification { .. }));
}

#[test]
fn delete_reports_whether_record_existed() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordStore::<Privilege>::new();
    store
        .add(&conn, &Privilege::new("read", "application"))
        .unwrap();

    assert!(store.delete(&conn, &"read".to_string()).unwrap());
    assert!(!store.delete(&conn, &"read".to_string()).unwrap());
    assert_eq!(store.count(&conn).unwrap(), 0);
}

#[test]
fn browse_returns_every_record() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordStore::<UserRoleMapping>::new();
    for (user, source) in [("bob", "default"), ("alice", "default"), ("alice", "ldap")] {
        store
            .add(&conn, &UserRoleMapping::new(user, source, Vec::new()))
            .unwrap();
    }

    let mut keys: Vec<_> = store
        .browse(&conn)
        .unwrap()
        .into_iter()
        .map(|mapping| (mapping.user_id, mapping.source))
        .collect();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            ("alice".to_string(), "default".to_string()),
            ("alice".to_string(), "ldap".to_string()),
            ("bob".to_string(), "default".to_string()),
        ]
    );
    assert!(store
        .read(&conn, &MappingKey::new("bob", "ldap"))
        .unwrap()
        .is_none());
}

#[test]
fn blank_identity_never_reaches_storage() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordStore::<User>::new();

    let err = store.add(&conn, &User::new("   ")).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(store.count(&conn).unwrap(), 0);
}

#[test]
fn register_runs_hook_only_on_first_preparation() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordStore::<Role>::new();

    let ran = store
        .register(&conn, |conn| {
            store.add(conn, &Role::new("seed", "Seeded"))?;
            Ok(())
        })
        .unwrap();
    assert!(ran);
    assert!(store.is_ready());

    // Same process: the state machine short-circuits.
    let ran_again = store
        .register(&conn, |_| panic!("hook must not run twice"))
        .unwrap();
    assert!(!ran_again);

    // A fresh store over the same database sees the durable marker.
    let fresh = RecordStore::<Role>::new();
    assert!(!fresh
        .register(&conn, |_| panic!("hook must not run for prepared kind"))
        .unwrap());
    assert_eq!(fresh.count(&conn).unwrap(), 1);
}

#[test]
fn failed_hook_rolls_back_and_poisons_registration() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordStore::<Role>::new();

    let err = store
        .register(&conn, |conn| {
            store.add(conn, &Role::new("dup", "First"))?;
            store.add(conn, &Role::new("dup", "Second"))?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
    assert!(!store.is_ready());
    assert_eq!(store.count(&conn).unwrap(), 0);

    let retry = store.register(&conn, |_| Ok(())).unwrap_err();
    assert!(matches!(retry, StoreError::RegistrationFailed(_)));

    let marker: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM store_registrations WHERE kind = 'roles';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(marker, 0);
}
