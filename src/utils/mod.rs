pub mod eligibility;
pub mod lottery;
