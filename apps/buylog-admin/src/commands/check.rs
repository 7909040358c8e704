use super::Context;

/// Compare every cached group with the persisted membership rows.
pub async fn cmd_check(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let groups = ctx.groups.groups().await;
    let mut problems = 0;

    for group in &groups {
        let persisted = ctx.store.count_members_in_group(&group.id).await?;
        if persisted != group.member_count() as u64 {
            tracing::warn!(
                group_id = %group.id,
                cached = group.member_count(),
                persisted,
                "member count mismatch"
            );
            problems += 1;
        }
        if !group.has_contiguous_positions() {
            tracing::warn!(group_id = %group.id, "positions are not contiguous");
            problems += 1;
        }
        if group.member_count() < 2 {
            tracing::warn!(group_id = %group.id, "group has fewer than two members");
            problems += 1;
        }
    }

    if problems > 0 {
        return Err(format!("{} problem(s) found in {} group(s)", problems, groups.len()).into());
    }
    println!("✓ {} group(s) consistent", groups.len());
    Ok(())
}
