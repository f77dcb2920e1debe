use ledgerdb::{Account, ConnectionConfig, DbError, Ledger};

fn ledger() -> Ledger {
    Ledger::open(ConnectionConfig::new("admin", "adminpass")).unwrap()
}

#[test]
fn crud_round_trip() {
    let ledger = ledger();
    let repository = ledger.repository();
    let mut session = ledger.session();

    let account = Account::new("acct_v0", 10_000);
    repository.save(&mut session, &account).unwrap();

    let found = repository.find_by_id(&mut session, "acct_v0").unwrap();
    assert_eq!(found, account);

    repository.update(&mut session, "acct_v0", 20_000).unwrap();
    assert_eq!(
        repository
            .find_by_id(&mut session, "acct_v0")
            .unwrap()
            .balance(),
        20_000
    );

    assert_eq!(repository.delete(&mut session, "acct_v0").unwrap(), 1);
    assert!(matches!(
        repository.find_by_id(&mut session, "acct_v0"),
        Err(DbError::NotFound(_))
    ));
}

#[test]
fn find_by_id_on_never_created_key_is_not_found() {
    let ledger = ledger();
    let repository = ledger.repository();
    let mut session = ledger.session();

    assert!(matches!(
        repository.find_by_id(&mut session, "never_created"),
        Err(DbError::NotFound(key)) if key == "never_created"
    ));
}

#[test]
fn second_delete_is_a_no_op() {
    let ledger = ledger();
    let repository = ledger.repository();
    let mut session = ledger.session();

    repository
        .save(&mut session, &Account::new("gone", 1))
        .unwrap();
    assert_eq!(repository.delete(&mut session, "gone").unwrap(), 1);
    assert_eq!(repository.delete(&mut session, "gone").unwrap(), 0);
}

#[test]
fn duplicate_save_surfaces_the_engine_error() {
    let ledger = ledger();
    let repository = ledger.repository();
    let mut session = ledger.session();

    let account = Account::new("dup", 5);
    repository.save(&mut session, &account).unwrap();

    let err = repository.save(&mut session, &account).unwrap_err();
    match err {
        DbError::DataAccess { operation, key, .. } => {
            assert_eq!(operation, "save");
            assert_eq!(key, "dup");
        }
        other => panic!("expected DataAccess, got {other:?}"),
    }
}
