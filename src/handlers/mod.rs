// Two security tiers: public (no auth) and protected (operator JWT)
pub mod protected;
pub mod public;
