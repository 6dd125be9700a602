//! Unit tests for public building blocks, run as one integration binary.

mod unit;
