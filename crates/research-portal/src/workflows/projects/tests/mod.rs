mod common;
mod guards;
