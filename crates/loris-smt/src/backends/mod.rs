pub mod z3_backend;
