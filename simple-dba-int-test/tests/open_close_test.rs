use simple_dba::errors::ErrorKind;
use simple_dba_int_test::test_util::for_each_handler;
use std::path::Path;

#[test]
fn test_open_returns_session_and_records_mode() {
    for_each_handler(|ctx| {
        let mut dba = ctx.dba("mystore")?;
        let session = dba.open("c")?;

        assert!(!session.is_closed());
        assert_eq!(session.handler_name(), dba_handler_name(ctx.handler()));
        assert!(dba.is_open());
        assert_eq!(dba.mode(), Some("c"));
        assert!(Path::new(ctx.path()).is_dir());
        Ok(())
    });
}

#[test]
fn test_open_default_uses_truncating_mode() {
    for_each_handler(|ctx| {
        let mut dba = ctx.open_dba("mystore", "c")?;
        dba.insert("123", "hello world")?;
        dba.close()?;

        dba.open_default()?;
        assert_eq!(dba.mode(), Some("n"));
        assert_eq!(dba.fetch("123")?, None);
        Ok(())
    });
}

#[test]
fn test_open_creates_missing_base_directory() {
    for_each_handler(|ctx| {
        let nested = Path::new(ctx.path()).join("a").join("b");
        let mut dba = ctx.dba("mystore")?;
        dba.set_path(&nested.to_string_lossy())?;

        dba.open("c")?;
        assert!(nested.is_dir());
        Ok(())
    });
}

#[test]
fn test_open_replaces_file_at_base_path() {
    for_each_handler(|ctx| {
        std::fs::write(ctx.path(), b"not a directory")?;

        let mut dba = ctx.dba("mystore")?;
        dba.open("c")?;
        assert!(Path::new(ctx.path()).is_dir());
        Ok(())
    });
}

#[test]
fn test_invalid_mode_fails_to_open() {
    for_each_handler(|ctx| {
        let mut dba = ctx.dba("mystore")?;

        let err = dba.open("x").err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::BackendOpenError);
        assert!(err.is_kind(&ErrorKind::InvalidMode));
        assert!(!dba.is_open());
        Ok(())
    });
}

#[test]
fn test_existing_store_modes_fail_on_missing_store() {
    for_each_handler(|ctx| {
        for mode in ["r", "w"] {
            let mut dba = ctx.dba("missing")?;
            let err = dba.open(mode).err().unwrap();
            assert_eq!(err.kind(), &ErrorKind::BackendOpenError, "{}", mode);
            assert!(dba.session().is_none());
        }
        Ok(())
    });
}

#[test]
fn test_close_clears_session_and_is_idempotent() {
    for_each_handler(|ctx| {
        let mut dba = ctx.open_dba("mystore", "c")?;
        let session = dba.session().cloned().unwrap();

        dba.close()?;
        assert!(dba.session().is_none());
        assert!(session.is_closed());

        dba.close()?;
        assert!(dba.session().is_none());
        Ok(())
    });
}

#[test]
fn test_close_without_open() {
    for_each_handler(|ctx| {
        let mut dba = ctx.dba("mystore")?;
        dba.close()?;
        assert!(dba.session().is_none());
        Ok(())
    });
}

#[test]
fn test_operations_on_closed_store_fail() {
    for_each_handler(|ctx| {
        let mut dba = ctx.open_dba("mystore", "c")?;
        dba.close()?;

        assert_eq!(dba.fetch("1").err().unwrap().kind(), &ErrorKind::StoreNotOpen);
        assert_eq!(
            dba.insert("1", "a").err().unwrap().kind(),
            &ErrorKind::StoreNotOpen
        );
        assert_eq!(dba.delete("1").err().unwrap().kind(), &ErrorKind::StoreNotOpen);
        assert_eq!(dba.first_key().err().unwrap().kind(), &ErrorKind::StoreNotOpen);
        assert_eq!(dba.sync().err().unwrap().kind(), &ErrorKind::StoreNotOpen);
        Ok(())
    });
}

#[test]
fn test_reopen_releases_previous_session() {
    for_each_handler(|ctx| {
        let mut dba = ctx.open_dba("mystore", "c")?;
        let first = dba.session().cloned().unwrap();

        dba.open("c")?;
        assert!(first.is_closed());
        assert!(dba.is_open());
        Ok(())
    });
}

#[test]
fn test_read_only_store_rejects_writes() {
    for_each_handler(|ctx| {
        let mut dba = ctx.open_dba("mystore", "c")?;
        dba.insert("123", "hello world")?;
        dba.close()?;

        dba.open("r")?;
        assert_eq!(dba.fetch_string("123")?, Some("hello world".to_string()));
        let err = dba.insert("456", "other").err().unwrap();
        assert!(err.is_kind(&ErrorKind::ReadOnlyStore));
        Ok(())
    });
}

#[test]
fn test_open_persistent_shares_session() {
    for_each_handler(|ctx| {
        let mut first = ctx.dba("mystore")?;
        first.open_persistent("c")?;
        first.insert("123", "hello world")?;

        let mut second = ctx.dba("mystore")?;
        second.open_persistent("c")?;

        let a = first.session().unwrap();
        let b = second.session().unwrap();
        assert!(a.same_session(b));
        assert!(a.is_persistent());
        assert_eq!(second.fetch_string("123")?, Some("hello world".to_string()));

        first.close()?;
        assert!(first.session().is_none());
        assert!(!second.session().unwrap().is_closed());
        assert_eq!(second.fetch_string("123")?, Some("hello world".to_string()));
        Ok(())
    });
}

fn dba_handler_name(handler: &str) -> &str {
    match handler {
        "lmdb" => "fjall",
        other => other,
    }
}
