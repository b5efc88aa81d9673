pub mod job;
pub mod message;
pub mod query;
pub mod status;
pub mod visitor;

pub use job::{ContainerJobSpec, DispatchProfile, JobContext, JobContextInfo, JobInfo, JobNotify};
pub use message::{JobMsg, JobOperation};
pub use query::{split_ids, JobInfoQueryParams, JobStatusQueryParams, JobTotal, JobTotalQueryParams};
pub use status::{ExecutorRecord, JobStatus, EXT_IS_DELETED, EXT_RESULT, EXT_TENANT_ID};
pub use visitor::Visitor;
