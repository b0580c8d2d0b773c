pub mod dna;
pub mod pack;

#[cfg(test)]
pub(crate) mod testutil;
