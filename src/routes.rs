pub mod admissions;
pub mod api;
pub mod attendance;
pub mod communications;
pub mod courses;
pub mod dashboards;
pub mod export;
pub mod grading;
pub mod index;
pub mod payments;
pub mod schedule;
pub mod sse;
pub mod students;
