//! Target management command handlers.

/// Seed/refresh `tracked_targets` from the YAML targets file.
pub(crate) async fn run_targets_sync(
    pool: &sqlx::PgPool,
    config: &churnwatch_core::AppConfig,
) -> anyhow::Result<()> {
    let targets_file = churnwatch_core::load_targets(&config.targets_path)?;
    let (inserted, updated) = churnwatch_db::seed::sync_targets(pool, &targets_file).await?;

    println!(
        "synced {} targets from {}: {inserted} new, {updated} refreshed",
        targets_file.targets.len(),
        config.targets_path.display()
    );

    Ok(())
}

/// List tracked targets with their active follower counts.
pub(crate) async fn run_targets_list(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let targets = churnwatch_db::list_targets(pool).await?;

    if targets.is_empty() {
        println!("no tracked targets — run `targets sync` to seed from the targets file");
        return Ok(());
    }

    for target in &targets {
        let active = churnwatch_db::count_active_followers(pool, target.id).await?;
        println!(
            "{:<24} {:>8} active followers  (tracked since {})",
            target.handle,
            active,
            target.created_at.format("%Y-%m-%d")
        );
    }

    Ok(())
}
