use simple_dba::errors::{DbaError, DbaResult, ErrorKind};
use simple_dba::store::DbaHandlers;
use simple_dba::Dba;
use std::backtrace::Backtrace;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Runs a test with retry logic and error handling.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> DbaResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> DbaResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> DbaResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => after(ctx.clone())
                        .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                    Err(e) => {
                        let _ = after(ctx.clone());
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_error = Some(e.clone());
                last_backtrace = Some(bt);
                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Error: {}", e);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };

                last_error = Some(format!("Panic: {}", err_msg));
                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Panicked (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Panic: {}", err_msg);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
        }
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

/// A base directory and a handler under test, with a registry of its own so
/// in-memory tables and persistent sessions never leak between tests.
#[derive(Clone)]
pub struct TestContext {
    inner: Arc<TestContextInner>,
}

struct TestContextInner {
    path: String,
    handler: String,
    handlers: DbaHandlers,
}

impl TestContext {
    pub fn new(path: String, handler: &str, handlers: DbaHandlers) -> Self {
        TestContext {
            inner: Arc::new(TestContextInner {
                path,
                handler: handler.to_string(),
                handlers,
            }),
        }
    }

    /// Base directory of the stores; not created until a store is opened.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn handler(&self) -> &str {
        &self.inner.handler
    }

    pub fn handlers(&self) -> DbaHandlers {
        self.inner.handlers.clone()
    }

    /// A closed facade on `store_name` bound to the handler under test.
    pub fn dba(&self, store_name: &str) -> DbaResult<Dba> {
        Dba::builder()
            .path(self.path())
            .store_name(store_name)
            .handler(self.handler())
            .handlers(self.handlers())
            .build()
    }

    /// Same as `dba`, opened with `mode`.
    pub fn open_dba(&self, store_name: &str, mode: &str) -> DbaResult<Dba> {
        let mut dba = self.dba(store_name)?;
        dba.open(mode)?;
        Ok(dba)
    }
}

pub fn random_path() -> String {
    let id = uuid::Uuid::new_v4();
    env::temp_dir()
        .join(format!("simple_dba_it_{}", id))
        .to_string_lossy()
        .to_string()
}

/// Registry holding the built-in handlers, plus fjall when enabled.
pub fn test_handlers() -> DbaResult<DbaHandlers> {
    let handlers = DbaHandlers::with_defaults();

    #[cfg(feature = "fjall")]
    {
        use simple_dba::store::DbaModule;
        use simple_dba_fjall_adapter::FjallModule;

        // one flush and one compaction worker per keyspace
        FjallModule::with_config()
            .low_memory_preset()
            .build()
            .load(&handlers)?;
    }

    Ok(handlers)
}

/// Identifiers of every handler the scenario suites run against.
pub fn handlers_under_test() -> Vec<&'static str> {
    let mut names = vec!["flatfile", "inmemory"];
    if cfg!(feature = "fjall") {
        names.push("fjall");
        names.push("lmdb");
    }
    names
}

pub fn create_test_context(handler: &str) -> DbaResult<TestContext> {
    let path = random_path();
    if Path::new(&path).exists() {
        let _ = fs::remove_dir_all(&path);
    }
    Ok(TestContext::new(path, handler, test_handlers()?))
}

/// Closes the persistent sessions of the context and removes its directory.
pub fn cleanup(ctx: TestContext) -> DbaResult<()> {
    ctx.handlers().close_persistent()?;

    let path = Path::new(ctx.path());
    if !path.exists() {
        return Ok(());
    }

    let mut attempt = 0;
    loop {
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };

        match result {
            Ok(_) => return Ok(()),
            Err(e) if attempt < 3 => {
                attempt += 1;
                log::warn!("Cleanup of {} failed, retrying: {}", ctx.path(), e);
                thread::sleep(Duration::from_millis(50 * attempt));
            }
            Err(e) => {
                return Err(DbaError::new_with_cause(
                    &format!("Failed to clean up {}", ctx.path()),
                    ErrorKind::IOError,
                    e.into(),
                ))
            }
        }
    }
}

/// Runs `test` once per handler under test, each with a fresh context.
pub fn for_each_handler<T>(test: T)
where
    T: Fn(TestContext) -> DbaResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    for handler in handlers_under_test() {
        log::debug!("Running scenario against '{}'", handler);
        run_test(|| create_test_context(handler), &test, cleanup);
    }
}
