pub mod analyze;
pub mod errors;
pub mod run;

use std::sync::Arc;

use jobs::{HttpJobApi, JobApi};

/// Job service client built from the environment.
pub(crate) fn job_api() -> anyhow::Result<Arc<dyn JobApi>> {
    let api = HttpJobApi::new(&crate::config::get_api_base(), crate::config::get_api_token())?;
    Ok(Arc::new(api))
}
