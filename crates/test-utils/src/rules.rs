// crates/test-utils/src/rules.rs

//! A small read-processing rule set used by the integration tests and
//! the genomics demo: trim paired reads, align them, split the
//! alignment per chromosome, and call variants on each piece.
//!
//! Instructions are plain `echo` commands so the same rules work
//! against both the fake backend and real shell processes.

use serde::{Deserialize, Serialize};

use pipedag::rule::Rule;

/// A pair of read files for one sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairedReads {
    pub sample: String,
    pub r1: String,
    pub r2: String,
}

/// Adapter-trimmed reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrimmedReads {
    pub sample: String,
    pub r1: String,
    pub r2: String,
}

/// One aligned output file for a sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alignment {
    pub sample: String,
    pub bam: String,
}

/// A per-chromosome slice of an alignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChrAlignment {
    pub sample: String,
    pub chr: String,
    pub bam: String,
}

/// A variant-call result file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vcf {
    pub sample: String,
    pub chr: String,
    pub vcf: String,
}

pub struct TrimReads;

impl Rule for TrimReads {
    type Input = PairedReads;
    type Output = TrimmedReads;

    fn name(&self) -> &str {
        "trim-reads"
    }

    fn derive_output(&self, input: &PairedReads) -> TrimmedReads {
        TrimmedReads {
            sample: input.sample.clone(),
            r1: format!("{}.trimmed", input.r1),
            r2: format!("{}.trimmed", input.r2),
        }
    }

    fn render_instruction(&self, input: &PairedReads, output: &TrimmedReads) -> String {
        format!(
            "echo trim {} {} '>' {} {}",
            input.r1, input.r2, output.r1, output.r2
        )
    }
}

pub struct AlignReads;

impl Rule for AlignReads {
    type Input = TrimmedReads;
    type Output = Alignment;

    fn name(&self) -> &str {
        "align-reads"
    }

    fn derive_output(&self, input: &TrimmedReads) -> Alignment {
        Alignment {
            sample: input.sample.clone(),
            bam: format!("{}.bam", input.sample),
        }
    }

    fn render_instruction(&self, input: &TrimmedReads, output: &Alignment) -> String {
        format!("echo align {} {} '>' {}", input.r1, input.r2, output.bam)
    }
}

/// Chromosomes each alignment is split into.
pub const CHROMOSOMES: [&str; 3] = ["chr1", "chr2", "chrM"];

pub struct SplitAlignment;

impl Rule for SplitAlignment {
    type Input = Alignment;
    type Output = Vec<ChrAlignment>;

    fn name(&self) -> &str {
        "split-alignment"
    }

    fn derive_output(&self, input: &Alignment) -> Vec<ChrAlignment> {
        CHROMOSOMES
            .iter()
            .map(|chr| ChrAlignment {
                sample: input.sample.clone(),
                chr: (*chr).to_string(),
                bam: format!("{}.{}.bam", input.sample, chr),
            })
            .collect()
    }

    fn render_instruction(&self, input: &Alignment, output: &Vec<ChrAlignment>) -> String {
        let pieces: Vec<&str> = output.iter().map(|c| c.bam.as_str()).collect();
        format!("echo split {} '>' {}", input.bam, pieces.join(" "))
    }
}

pub struct CallVariants;

impl Rule for CallVariants {
    type Input = ChrAlignment;
    type Output = Vcf;

    fn name(&self) -> &str {
        "call-variants"
    }

    fn derive_output(&self, input: &ChrAlignment) -> Vcf {
        Vcf {
            sample: input.sample.clone(),
            chr: input.chr.clone(),
            vcf: format!("{}.{}.vcf", input.sample, input.chr),
        }
    }

    fn render_instruction(&self, input: &ChrAlignment, output: &Vcf) -> String {
        format!("echo call {} '>' {}", input.bam, output.vcf)
    }
}

/// A rule whose instruction is the raw `command` field of its input, for
/// tests that need full control over what the shell runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawCommand {
    pub label: String,
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawDone {
    pub label: String,
}

pub struct RunRaw;

impl Rule for RunRaw {
    type Input = RawCommand;
    type Output = RawDone;

    fn name(&self) -> &str {
        "run-raw"
    }

    fn derive_output(&self, input: &RawCommand) -> RawDone {
        RawDone {
            label: input.label.clone(),
        }
    }

    fn render_instruction(&self, input: &RawCommand, _output: &RawDone) -> String {
        input.command.clone()
    }
}
