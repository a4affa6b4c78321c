//! Fjall handler for `simple_dba`.
//!
//! Loading [`FjallModule`] registers a handler under `fjall` and `lmdb`. Each
//! store is a fjall keyspace directory at the store's full path, with all pairs
//! kept in one partition.

mod config;
mod error;
mod handler;
mod module;
mod session;
mod version;

pub use config::*;
pub use handler::*;
pub use module::*;

#[cfg(test)]
pub(crate) mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use uuid::Uuid;

    #[ctor::ctor]
    fn init() {
        colog::init();
    }

    #[derive(Clone)]
    pub struct Context {
        inner: Arc<ContextInner>,
    }

    struct ContextInner {
        path: String,
    }

    impl Context {
        pub fn new() -> Self {
            let path = std::env::temp_dir()
                .join(format!("simple_dba_fjall_{}", Uuid::new_v4()))
                .to_string_lossy()
                .to_string();
            Context {
                inner: Arc::new(ContextInner { path }),
            }
        }

        pub fn path(&self) -> String {
            self.inner.path.clone()
        }
    }

    impl Drop for ContextInner {
        fn drop(&mut self) {
            let path = Path::new(&self.path);
            if !path.exists() {
                return;
            }

            // background flush threads may still hold files for a moment
            for attempt in 1..=3 {
                match fs::remove_dir_all(path) {
                    Ok(_) => return,
                    Err(e) if attempt < 3 => {
                        log::warn!("Cleanup of {} failed, retrying: {}", self.path, e);
                        thread::sleep(Duration::from_millis(50 * attempt));
                    }
                    Err(e) => log::error!("Failed to clean up {} after test: {}", self.path, e),
                }
            }
        }
    }

    pub fn run_test<T, B, A>(before: B, test: T, after: A)
    where
        T: FnOnce(Context) + std::panic::UnwindSafe,
        B: FnOnce() -> Context + std::panic::UnwindSafe,
        A: FnOnce(Context) + std::panic::UnwindSafe,
    {
        let result = std::panic::catch_unwind(|| {
            let ctx = before();
            test(ctx.clone());
            after(ctx.clone());
            drop(ctx);
        });

        if let Err(e) = result {
            let panic_msg = if let Some(msg) = e.downcast_ref::<String>() {
                msg.clone()
            } else if let Some(msg) = e.downcast_ref::<&str>() {
                msg.to_string()
            } else {
                format!("{:?}", e)
            };

            eprintln!("Test execution failed with panic: {}", panic_msg);
            panic!("Test execution failed with panic: {}", panic_msg);
        }
    }

    #[cfg(test)]
    mod context_tests {
        use super::*;

        #[test]
        fn test_context_drop_without_files() {
            let ctx = Context::new();
            assert!(!Path::new(&ctx.path()).exists());
            drop(ctx);
        }

        #[test]
        fn test_context_removes_directory() {
            let ctx = Context::new();
            let path = ctx.path();
            fs::create_dir_all(Path::new(&path).join("partitions")).unwrap();
            drop(ctx);
            assert!(!Path::new(&path).exists());
        }

        #[test]
        fn test_harness_preserves_string_panic_message() {
            let test_msg = "Expected string panic message";
            let caught = std::panic::catch_unwind(|| {
                run_test(
                    Context::new,
                    |_ctx| {
                        panic!("{}", test_msg);
                    },
                    |_ctx| {},
                );
            });

            let err = caught.err().unwrap();
            let panic_msg = err.downcast_ref::<String>().unwrap();
            assert!(panic_msg.contains(test_msg), "got: {}", panic_msg);
        }
    }
}
