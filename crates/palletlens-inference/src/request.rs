//! Per-attempt analysis request.

use palletlens_core::types::{DetailLevel, ImageEncoding};

use crate::prompt::{SYSTEM_PROMPT, USER_PROMPT};

/// System and user text sent with the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub system: &'static str,
    pub user: &'static str,
}

impl Default for Instruction {
    fn default() -> Self {
        Self {
            system: SYSTEM_PROMPT,
            user: USER_PROMPT,
        }
    }
}

/// One image plus the fixed instruction. Built fresh for every attempt.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    encoding: ImageEncoding,
    instruction: Instruction,
    detail: DetailLevel,
}

impl AnalysisRequest {
    pub fn new(encoding: ImageEncoding, detail: DetailLevel) -> Self {
        Self {
            encoding,
            instruction: Instruction::default(),
            detail,
        }
    }

    pub fn encoding(&self) -> &ImageEncoding {
        &self.encoding
    }

    pub fn instruction(&self) -> &Instruction {
        &self.instruction
    }

    pub fn detail(&self) -> DetailLevel {
        self.detail
    }
}
