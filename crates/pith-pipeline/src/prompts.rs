//! Prompt builders and schemas for every structured call in the pipelines.
//!
//! Prompts state the extraction contract; the schema directive (shape hint,
//! enum value lists, JSON-only instruction) is appended by the structured
//! client, so nothing here repeats it.

use pith_core::{Chapter, Claim, ClaimLabel, ClaimType, Idea};
use pith_inference::{Field, Schema, Shape};

// =============================================================================
// CLAIM EXTRACTION (S1)
// =============================================================================

pub fn claim_extraction_schema() -> Schema {
    Schema::new(Shape::object(vec![Field::required(
        "claims",
        Shape::array(Shape::object(vec![
            Field::required("claim", Shape::String),
            Field::required("type", Shape::Enum(ClaimType::VALUES)),
        ])),
    )]))
}

pub fn claim_extraction_prompt(chunk_text: &str) -> String {
    format!(
        "Extract every decision-relevant claim from this book excerpt. A claim is one \
         atomic, context-free assertion: a principle, rule, recommendation, constraint, \
         or causal statement. Rewrite each claim so it stands alone without the \
         surrounding text. Skip anecdotes, throat-clearing, and repeated points.\n\n\
         EXCERPT:\n{}",
        chunk_text
    )
}

// =============================================================================
// CLAIM FILTERING (S2)
// =============================================================================

pub fn claim_filter_schema() -> Schema {
    Schema::new(Shape::object(vec![Field::required(
        "evaluations",
        Shape::array(Shape::object(vec![
            Field::required("claim", Shape::String),
            Field::required("label", Shape::Enum(ClaimLabel::VALUES)),
            Field::required("score", Shape::Number),
            Field::required("reason", Shape::String),
        ])),
    )]))
}

pub fn claim_filter_prompt(claims: &[&Claim]) -> String {
    let listed = claims
        .iter()
        .map(|c| format!("- {}", c.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Evaluate each claim below. Label it core_insight if it changes decisions or \
         introduces a real constraint, supporting_insight if it sharpens a core insight, \
         redundant if another claim already covers it, or filler otherwise. Echo the \
         claim text exactly as given, and score usefulness in [0, 1] with a one-line \
         reason.\n\nCLAIMS:\n{}",
        listed
    )
}

// =============================================================================
// IDEA CLUSTERING (S3)
// =============================================================================

pub fn cluster_schema() -> Schema {
    Schema::new(Shape::object(vec![Field::required(
        "ideas",
        Shape::array(Shape::object(vec![
            Field::required("idea_title", Shape::String),
            Field::required("merged_claims", Shape::array(Shape::String)),
            Field::required("summary", Shape::String),
        ])),
    )]))
}

pub fn cluster_prompt(claims: &[Claim], min_ideas: usize, max_ideas: usize) -> String {
    let listed = claims
        .iter()
        .map(|c| format!("- {}", c.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Cluster the claims below into distinct ideas. An idea is one decision rule; \
         merge every claim that expresses the same underlying rule into a single idea \
         and give it a short declarative title. Aim for {}-{} ideas at most; a weak book \
         should collapse to fewer. Every kept claim must appear in exactly one idea's \
         merged_claims.\n\nCLAIMS (strongest first):\n{}",
        min_ideas, max_ideas, listed
    )
}

// =============================================================================
// IDEA EXPANSION (S4)
// =============================================================================

pub fn expand_schema() -> Schema {
    Schema::new(Shape::object(vec![
        Field::required("principle", Shape::String),
        Field::required("behavior_delta", Shape::String),
    ]))
}

pub fn expand_prompt(title: &str, merged_claims: &[String]) -> String {
    let listed = merged_claims
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Expand the idea \"{}\" from its merged claims. Write `principle` as 2-4 \
         sentences stating the rule and when it applies, and `behavior_delta` as 2-4 \
         sentences describing how a reader's decisions, prioritization, and scheduling \
         change once they accept it. No hedging, no book references.\n\nMERGED \
         CLAIMS:\n{}",
        title, listed
    )
}

// =============================================================================
// RECONSTRUCTION (S5, text-only)
// =============================================================================

pub fn reconstruct_prompt(title: &str, author: Option<&str>, ideas: &[Idea]) -> String {
    let byline = author.map(|a| format!(" by {}", a)).unwrap_or_default();
    let mut sections = String::new();
    for (i, idea) in ideas.iter().enumerate() {
        sections.push_str(&format!("IDEA {}: {}\n", i + 1, idea.title));
        if let Some(p) = &idea.principle {
            sections.push_str(&format!("principle: {}\n", p));
        }
        if let Some(d) = &idea.behavior_delta {
            sections.push_str(&format!("behavior delta: {}\n", d));
        }
        for claim in &idea.merged_claims {
            sections.push_str(&format!("- {}\n", claim));
        }
        sections.push('\n');
    }

    format!(
        "Reconstruct the distilled book \"{}\"{} from the ideas below, as markdown with \
         exactly this skeleton: begin with a 2-3 sentence introduction (no heading), \
         then for each idea in order a `## Idea N: <Title>` section containing \
         `### Core Principle` and `### What This Changes` subsections, plus \
         `### Best Example` only where an idea includes a concrete example worth \
         keeping. Separate idea sections with a horizontal rule (`---`). Use the \
         provided principle and behavior-delta prose as the basis for the subsections; \
         tighten, never pad.\n\n{}",
        title, byline, sections
    )
}

// =============================================================================
// TOC DETECTION
// =============================================================================

pub fn toc_schema() -> Schema {
    Schema::new(Shape::object(vec![
        Field::required("has_toc", Shape::Boolean),
        Field::required(
            "entries",
            Shape::array(Shape::object(vec![
                Field::required("title", Shape::String),
                Field::required("normalized_title", Shape::String),
                Field::optional("page_number", Shape::Integer),
                Field::required("level", Shape::Integer),
            ])),
        ),
        Field::optional("toc_start_page", Shape::Integer),
        Field::optional("toc_end_page", Shape::Integer),
        Field::required("confidence", Shape::Enum(&["high", "medium", "low"])),
    ]))
}

pub fn toc_prompt(front_matter: &str) -> String {
    format!(
        "These are the first pages of a book, with page-break markers. Decide whether \
         they contain a table of contents. If so, list its entries in order with the \
         title as printed, a normalized_title stripped of numbering and page numbers, \
         the page_number when printed, and a level (1 = part, 2 = chapter, \
         3 = subsection). Report which pages the table spans and your confidence.\n\n\
         PAGES:\n{}",
        front_matter
    )
}

// =============================================================================
// DENSITY ANALYSIS
// =============================================================================

pub fn density_schema() -> Schema {
    Schema::new(Shape::object(vec![
        Field::required("density_score", Shape::Number),
        Field::required("characteristics", Shape::array(Shape::String)),
        Field::required("recommended_compression", Shape::Number),
        Field::required("recommended_context_size", Shape::Number),
        Field::optional("analysis_notes", Shape::String),
    ]))
}

pub fn density_prompt(sample: &str) -> String {
    format!(
        "Rate the information density of this book sample on a 1-10 scale, where 1 is \
         padded narrative and 10 is reference-grade signal. List the characteristics \
         that drove the score, recommend a compression ratio in [0.15, 0.60] \
         (output words / input words) and a context window in [100, 350] words for \
         compressing passages of this material.\n\nSAMPLE:\n{}",
        sample
    )
}

// =============================================================================
// CHAPTER COMPRESSION (C1)
// =============================================================================

pub fn compress_schema() -> Schema {
    Schema::new(Shape::object(vec![
        Field::required("compressed_content", Shape::String),
        Field::required("key_insights", Shape::array(Shape::String)),
        Field::optional("compression_notes", Shape::String),
    ]))
}

pub fn compress_prompt(
    book_title: &str,
    chapter: &Chapter,
    is_first: bool,
    compression_ratio: f32,
) -> String {
    let hook = if is_first {
        "This is the opening chapter: keep the hook that earns the reader's attention, \
         then compress hard.\n\n"
    } else {
        ""
    };
    format!(
        "Compress the chapter \"{}\" of the book \"{}\" to roughly {:.0}% of its length. \
         Preserve the argument structure, every rule and constraint, and concrete \
         numbers; drop anecdotes that only re-illustrate a made point. Write flowing \
         prose, not bullet notes, and list the chapter's key insights separately.\n\n{}\
         CHAPTER CONTENT:\n{}",
        chapter.title,
        book_title,
        compression_ratio * 100.0,
        hook,
        chapter.original_content
    )
}

// =============================================================================
// BOOK ASSEMBLY (C2, text-only)
// =============================================================================

pub fn assemble_prompt(title: &str, author: Option<&str>, chapters: &[Chapter]) -> String {
    let byline = author.map(|a| format!(" by {}", a)).unwrap_or_default();
    let mut body = String::new();
    for chapter in chapters {
        body.push_str(&format!("## {}\n\n", chapter.title));
        if let Some(compressed) = &chapter.compressed_content {
            body.push_str(compressed);
        }
        body.push_str("\n\n");
        if let Some(insights) = &chapter.key_insights {
            for insight in insights {
                body.push_str(&format!("- {}\n", insight));
            }
        }
        body.push('\n');
    }

    format!(
        "Assemble the compressed chapters of \"{}\"{} into one markdown document: a \
         short overview first, then every chapter below verbatim under its heading \
         (do not rewrite chapter bodies), and finish with a `## Key Takeaways` section \
         distilled from the listed insights.\n\nCOMPRESSED CHAPTERS:\n{}",
        title, byline, body
    )
}
