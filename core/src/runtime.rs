use rayon::ThreadPoolBuilder;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;

static THREAD_POOL_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize the global Rayon thread pool used by CPU-parallel routines.
///
/// Priority:
/// 1. `num_threads` argument
/// 2. `FIDUCIAL_CPU_THREADS` environment variable
/// 3. Rayon default
pub fn init_global_thread_pool(num_threads: Option<usize>) -> Result<(), String> {
    let res = THREAD_POOL_INIT.get_or_init(|| {
        let configured_threads = match num_threads {
            Some(n) => Some(n),
            None => read_cpu_threads_from_env()?,
        };

        let mut builder = ThreadPoolBuilder::new();
        if let Some(n) = configured_threads {
            if n == 0 {
                return Err("FIDUCIAL_CPU_THREADS must be >= 1".to_string());
            }
            builder = builder.num_threads(n);
        }

        builder.build_global().map_err(|e| e.to_string())
    });
    res.clone()
}

pub fn current_cpu_threads() -> usize {
    rayon::current_num_threads()
}

/// Read and parse an environment variable.
///
/// Returns `Ok(None)` when the variable is not set.
pub fn read_env_var<T: FromStr>(name: &str) -> crate::Result<Option<T>> {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(e) => {
            return Err(crate::Error::InvalidParameters(format!(
                "failed to read {name}: {e}"
            )))
        }
    };

    raw.trim().parse::<T>().map(Some).map_err(|_| {
        crate::Error::InvalidParameters(format!("{name} has an unparsable value '{raw}'"))
    })
}

fn read_cpu_threads_from_env() -> Result<Option<usize>, String> {
    let parsed = read_env_var::<usize>("FIDUCIAL_CPU_THREADS").map_err(|e| e.to_string())?;
    if parsed == Some(0) {
        return Err("FIDUCIAL_CPU_THREADS must be >= 1".to_string());
    }
    if let Some(n) = parsed {
        tracing::debug!("Using {} CPU threads from FIDUCIAL_CPU_THREADS", n);
    }
    Ok(parsed)
}
