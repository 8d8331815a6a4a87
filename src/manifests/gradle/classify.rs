//! Classification of calls into declarations, ignored, skipped and unsupported.

use super::ast::{CallForm, CallNode};
use super::resolver::Resolver;
use crate::config::KeywordConfig;

/// Where a call sits in the build script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    /// Directly at the top of the file.
    TopLevel,
    /// Anywhere inside a dependencies block.
    Dependencies,
    /// Inside some other block (`android { }`, `plugins { }`, ...).
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A dependency configuration call.
    Declaration,
    /// Matches an ignore keyword; never inventoried.
    Ignored,
    /// Known non-dependency call.
    Skipped,
    /// Opens a dependencies block.
    Block,
    /// Unknown call inside a dependencies block.
    Unsupported,
    /// Unknown call elsewhere; only its nested block matters.
    Unrelated,
}

pub struct Classifier<'a> {
    keywords: &'a KeywordConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(keywords: &'a KeywordConfig) -> Self {
        Self { keywords }
    }

    pub fn is_skipped(&self, name: &str) -> bool {
        self.keywords.skip.contains(name)
    }

    pub fn is_wrapper(&self, name: &str) -> bool {
        self.keywords.wrappers.contains(name)
    }

    /// Classify `node` by exact name match. A visible local binding with the
    /// same name shadows ignore and configuration keywords.
    pub fn classify(&self, node: &CallNode, context: Context, resolver: &Resolver) -> Classification {
        if node.form == CallForm::Assignment {
            return Classification::Unrelated;
        }

        let name = node.name.as_str();
        if !resolver.is_bound(name) {
            if self.keywords.ignore.contains(name) {
                return Classification::Ignored;
            }
            if self.keywords.blocks.contains(name) && node.nested_block.is_some() {
                return Classification::Block;
            }
            if self.keywords.configurations.contains(name) && context != Context::Other {
                return Classification::Declaration;
            }
        }

        if context != Context::Dependencies {
            return Classification::Unrelated;
        }
        if self.is_skipped(name) {
            return Classification::Skipped;
        }
        Classification::Unsupported
    }
}
