use simple_dba::errors::DbaResult;
use simple_dba_int_test::test_util::{cleanup, create_test_context, handlers_under_test};
use std::time::Instant;

fn main() -> DbaResult<()> {
    println!("Starting stress test...");
    let count = 20_000;

    for handler in handlers_under_test() {
        let ctx = create_test_context(handler)?;
        let mut dba = ctx.dba("stress")?;
        // a compaction per write makes the flat-file log quadratic
        dba.config().set_optimise_after_write(false);
        dba.open("n")?;

        let start = Instant::now();
        for i in 0..count {
            dba.insert(format!("key{:08}", i), uuid::Uuid::new_v4().to_string())?;
        }
        println!("[{}] Inserted {} keys in {:?}", handler, count, start.elapsed());

        let start = Instant::now();
        for i in (0..count).step_by(2) {
            dba.replace(format!("key{:08}", i), "replaced")?;
        }
        println!("[{}] Replaced {} keys in {:?}", handler, count / 2, start.elapsed());

        let start = Instant::now();
        let keys = dba.keys()?;
        println!("[{}] Iterated {} keys in {:?}", handler, keys.len(), start.elapsed());

        let start = Instant::now();
        dba.optimise()?;
        dba.sync()?;
        println!("[{}] Optimised and synced in {:?}", handler, start.elapsed());

        dba.close()?;
        cleanup(ctx)?;
    }
    Ok(())
}
