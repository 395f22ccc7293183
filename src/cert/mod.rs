mod inspect;

pub use inspect::summarize_certificate_data;
