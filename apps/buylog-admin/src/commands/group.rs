use super::Context;

pub async fn cmd_group_show(ctx: &Context, login: &str) -> Result<(), Box<dyn std::error::Error>> {
    let user = ctx.user(login).await?;
    let Some(group) = ctx.groups.lookup_group_by_user(&user.id).await else {
        println!("'{}' is not in a group.", login);
        return Ok(());
    };

    println!("Group {} ({} members):\n", group.id, group.member_count());
    for member in &group.members {
        let user = ctx.store.get_user_by_id(&member.user_id).await?;
        println!("  {}. {}", member.position, user.login);
    }
    Ok(())
}

pub async fn cmd_group_leave(ctx: &Context, login: &str) -> Result<(), Box<dyn std::error::Error>> {
    let user = ctx.user(login).await?;
    let group = ctx
        .groups
        .lookup_group_by_user(&user.id)
        .await
        .ok_or_else(|| format!("'{}' is not in a group", login))?;

    ctx.groups.remove_member(&user.id).await?;

    if ctx.groups.lookup_group(&group.id).await.is_none() {
        println!("✓ '{}' left group {}; the group was dissolved", login, group.id);
    } else {
        println!("✓ '{}' left group {}", login, group.id);
    }
    Ok(())
}
