//! Embedding step: populate every article node's vector.
//!
//! The embed key of an article is its hierarchy path plus its full text,
//! so vectors carry structural context. Large documents are scattered into
//! chunks embedded in parallel and re-joined in order.

use futures::future::try_join_all;
use tracing::debug;

use lexgraph_ai::{EmbedStats, Embedder};
use lexgraph_core::services::article_text;
use lexgraph_core::Normativa;

use crate::error::Result;
use crate::resources::EmbeddingMode;

/// Embed all article nodes of the document in place.
pub async fn embed_articles(
    embedder: &Embedder,
    normativa: &mut Normativa,
    scatter_chunk_size: usize,
    mode: EmbeddingMode,
) -> Result<EmbedStats> {
    let article_ids = normativa.tree.article_ids();
    if article_ids.is_empty() {
        return Ok(EmbedStats::default());
    }

    if mode == EmbeddingMode::Skipped {
        let zeros = vec![0.0f32; embedder.dimensions()];
        for id in article_ids {
            if let Some(article) = normativa.tree.node_mut(id).article_mut() {
                article.embedding = Some(zeros.clone());
            }
        }
        return Ok(EmbedStats::default());
    }

    let texts: Vec<String> = article_ids
        .iter()
        .map(|&id| {
            format!(
                "{}\n\n{}",
                normativa.tree.path(id),
                article_text::build_full_text(&normativa.tree, id)
            )
        })
        .collect();

    let chunk_size = scatter_chunk_size.max(1);
    let chunk_results = try_join_all(
        texts
            .chunks(chunk_size)
            .map(|chunk| embedder.embed_batch(chunk)),
    )
    .await?;

    let mut stats = EmbedStats::default();
    let mut vectors = Vec::with_capacity(texts.len());
    for (chunk_vectors, chunk_stats) in chunk_results {
        vectors.extend(chunk_vectors);
        stats.merge(chunk_stats);
    }

    debug!(
        document_id = %normativa.id,
        articles = article_ids.len(),
        generated = stats.generated,
        from_cache = stats.from_cache,
        "article embeddings assigned"
    );

    for (id, vector) in article_ids.into_iter().zip(vectors) {
        if let Some(article) = normativa.tree.node_mut(id).article_mut() {
            article.embedding = Some(vector);
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexgraph_ai::{EmbeddingConfig, SimulatedBackend, SlidingWindowRateLimiter};
    use lexgraph_core::domain::document::{Analysis, Metadata, Source};
    use lexgraph_core::domain::node::{DocumentTree, NodeType};
    use std::sync::Arc;
    use std::time::Duration;

    fn embedder(dims: usize) -> Embedder {
        let config = EmbeddingConfig {
            dimensions: dims,
            ..EmbeddingConfig::default()
        };
        Embedder::new(
            Arc::new(SimulatedBackend::new(config.clone())),
            None,
            Arc::new(SlidingWindowRateLimiter::new(10_000, Duration::from_secs(60))),
            config,
        )
    }

    fn normativa(article_count: usize) -> Normativa {
        let mut tree = DocumentTree::new("doc");
        let root = tree.root();
        for n in 1..=article_count {
            let art = tree.create_node(root, NodeType::Articulo, n.to_string(), 5);
            tree.add_text(art, format!("Contenido del artículo {n}."));
        }
        Normativa::new(Metadata::new("doc", Source::Boe), Analysis::default(), tree)
    }

    #[tokio::test]
    async fn test_all_articles_receive_vectors() {
        let embedder = embedder(8);
        let mut normativa = normativa(5);
        let stats = embed_articles(&embedder, &mut normativa, 2, EmbeddingMode::Simulated)
            .await
            .unwrap();
        assert_eq!(stats.generated, 5);

        for id in normativa.tree.article_ids() {
            let article = normativa.tree.node(id).article().unwrap();
            assert_eq!(article.embedding.as_ref().unwrap().len(), 8);
        }
    }

    #[tokio::test]
    async fn test_scatter_chunks_preserve_order() {
        let embedder = embedder(8);

        let mut scattered = normativa(7);
        embed_articles(&embedder, &mut scattered, 2, EmbeddingMode::Simulated)
            .await
            .unwrap();

        let mut whole = normativa(7);
        embed_articles(&embedder, &mut whole, 100, EmbeddingMode::Simulated)
            .await
            .unwrap();

        // Chunking must not change which vector lands on which article.
        for (a, b) in scattered
            .tree
            .article_ids()
            .into_iter()
            .zip(whole.tree.article_ids())
        {
            assert_eq!(
                scattered.tree.node(a).article().unwrap().embedding,
                whole.tree.node(b).article().unwrap().embedding
            );
        }
    }

    #[tokio::test]
    async fn test_skip_mode_assigns_zero_vectors() {
        let embedder = embedder(4);
        let mut normativa = normativa(2);
        let stats = embed_articles(&embedder, &mut normativa, 10, EmbeddingMode::Skipped)
            .await
            .unwrap();
        assert_eq!(stats.generated, 0);

        for id in normativa.tree.article_ids() {
            let article = normativa.tree.node(id).article().unwrap();
            assert_eq!(article.embedding.as_deref(), Some(&[0.0f32; 4][..]));
        }
    }

    #[tokio::test]
    async fn test_empty_document_is_noop() {
        let embedder = embedder(4);
        let mut normativa = normativa(0);
        let stats = embed_articles(&embedder, &mut normativa, 10, EmbeddingMode::Simulated)
            .await
            .unwrap();
        assert_eq!(stats.generated, 0);
    }
}
