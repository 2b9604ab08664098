pub mod bam;
pub mod cfa;
pub mod cpa;
pub mod jvm;
pub mod taint;
pub mod trace;
pub mod value;
