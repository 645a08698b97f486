pub mod check;
pub mod columns;
pub mod filter;
pub mod rollup;
pub mod search;
pub mod stats;
pub mod tree;
pub mod view;
pub mod window;
