mod jobs;
mod records;

pub use jobs::JobRepository;
pub use records::RecordRepository;
