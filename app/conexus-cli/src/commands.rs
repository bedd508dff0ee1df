use anyhow::{Context, Result};
use conexus_rag::{CaseStudy, RAGConfig, RAGEngine, SourceItem};
use serde::Serialize;
use tracing::info;

use crate::cli::{AskArgs, DeleteCaseArgs, IngestArgs};

#[derive(Serialize)]
struct AskOutput<'a> {
    question: &'a str,
    grounded_in_db: bool,
    best_score: f32,
    sources: Vec<SourceItem>,
}

pub async fn ingest(config: RAGConfig, args: IngestArgs) -> Result<()> {
    let mut engine = RAGEngine::new(config).await?;

    let case_id = args
        .case_id
        .unwrap_or_else(|| CaseStudy::slug_from_title(&args.title));
    let case = CaseStudy::new(case_id, args.title, args.url);

    let ids = engine.ingest_file(&case, &args.file).await?;
    info!(
        case_id = %case.case_id,
        file = %args.file.display(),
        chunks = ids.len(),
        "ingest complete"
    );
    println!("Ingested {} chunks for case '{}'", ids.len(), case.case_id);
    Ok(())
}

pub async fn ask(config: RAGConfig, args: AskArgs) -> Result<()> {
    let engine = RAGEngine::new(config).await?;
    let question = args.question.join(" ");

    let retrieval = engine
        .retrieve(&question)
        .await
        .context("Retrieval failed")?;
    let grounded = engine.is_grounded(&retrieval);
    let sources = retrieval.source_items(engine.config().retrieval.top_n);

    if args.json {
        let output = AskOutput {
            question: &question,
            grounded_in_db: grounded,
            best_score: retrieval.best_score,
            sources,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if !grounded {
        println!(
            "Not found in the case-study database (best score {:.3}).",
            retrieval.best_score
        );
    } else {
        println!("Best score {:.3}", retrieval.best_score);
    }
    for (rank, source) in sources.iter().enumerate() {
        println!();
        println!(
            "{}. {} [{}] score {:.3}",
            rank + 1,
            source.case_study.title,
            source.chunk.chunk_id,
            source.score
        );
        if let Some(link) = source.case_study.link() {
            println!("   {}", link);
        }
        println!("   {}", source.answer_snippet);
    }
    Ok(())
}

pub async fn stats(config: RAGConfig) -> Result<()> {
    let engine = RAGEngine::new(config).await?;
    let stats = engine.get_statistics().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub async fn delete_case(config: RAGConfig, args: DeleteCaseArgs) -> Result<()> {
    let mut engine = RAGEngine::new(config).await?;
    let deleted = engine.delete_case(&args.case_id).await?;
    println!("Deleted {} chunks of case '{}'", deleted, args.case_id);
    Ok(())
}

pub async fn ensure_indexes(config: RAGConfig) -> Result<()> {
    let engine = RAGEngine::new(config).await?;
    engine.ensure_indexes().await?;
    println!("Indexes ensured.");
    Ok(())
}
