pub mod webext_builder;
