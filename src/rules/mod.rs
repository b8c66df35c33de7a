// rules module — parsing/validation and workspace matching

pub mod matcher;
pub mod parse;

pub use matcher::{BranchMatch, MatchContext, find_matching_branch_rule, find_matching_repo_rule};
pub use parse::{
    BranchRule, ColorSpec, ParsedBranchRules, ParsedRepoRules, RepoRule, RuleQualifier,
    parse_branch_rules, parse_repo_rules,
};
