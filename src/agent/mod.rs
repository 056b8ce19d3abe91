/// Remote move-protocol client and its failure taxonomy.
pub mod client;
