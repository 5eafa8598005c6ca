//! Utility functions and helper macros shared by the loader, the bootstrap
//! engine and the writers.
//!
//! - A process-wide rayon [`THREAD_POOL`] sized from the
//!   `CLONALBOOT_NUM_THREADS` environment variable.
//! - Macros for common struct operations (getter functions, builder-style
//!   `with_*` methods).
//! - [`LabelInterner`] for deduplicating the string labels of large tables.
//! - Summary statistics over bootstrap iterations (see [`SummaryStats`]).

use hashbrown::HashSet;
use once_cell::sync::Lazy;
use rayon::{
    ThreadPool,
    ThreadPoolBuilder,
};

use crate::data_structs::typedef::LabelStr;

mod stats;
pub use stats::*;

pub const NUM_THREADS_ENV: &str = "CLONALBOOT_NUM_THREADS";

pub static THREAD_POOL: Lazy<ThreadPool> = Lazy::new(|| {
    let num_threads: Option<usize> = std::env::var(NUM_THREADS_ENV)
        .ok()
        .and_then(|str| str.parse::<usize>().ok());
    ThreadPoolBuilder::new()
        .num_threads(num_threads.unwrap_or(0))
        .thread_name(|idx| format!("clonalboot-{idx}"))
        .build()
        .expect("Failed to create thread pool")
});

pub fn n_threads() -> usize {
    THREAD_POOL.current_num_threads()
}

#[macro_export]
macro_rules! getter_fn {
    ($field_name: ident, $field_type: ty) => {
        pub fn $field_name(&self) -> &$field_type {
            &self.$field_name
        }
    };
}
pub use getter_fn;

#[macro_export]
macro_rules! with_field_fn {
    ($field_name: ident, $field_type: ty) => {
        paste::paste! {
            pub fn [<with_$field_name>](mut self, value: $field_type) -> Self {
            self.$field_name = value;
            self
            }
        }
    };
}
pub use with_field_fn;

/// Hands out one shared [`LabelStr`] per distinct string.
///
/// Clonal tables repeat the same sample ids, genotypes and guide names on
/// every row, so interning keeps a single allocation per label.
#[derive(Debug, Default)]
pub struct LabelInterner {
    labels: HashSet<LabelStr>,
}

impl LabelInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(
        &mut self,
        value: &str,
    ) -> LabelStr {
        if let Some(label) = self.labels.get(value) {
            return label.clone();
        }
        let label = LabelStr::from(value);
        self.labels.insert(label.clone());
        label
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
