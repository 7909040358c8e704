use buylog_groups::Outcome;
use chrono::{Duration, Utc};

use super::Context;

pub async fn cmd_invite_send(
    ctx: &Context,
    from: &str,
    to: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let sender = ctx.user(from).await?;

    match ctx.protocol.process_invite(&sender.id, to).await? {
        Outcome::InviteCreated(id) => {
            println!("✓ Invite {} sent from '{}' to '{}'", id, from, to);
        }
        Outcome::GroupMerged(group_id) => {
            println!("✓ '{}' and '{}' are now in group {}", from, to, group_id);
        }
    }
    Ok(())
}

pub async fn cmd_invite_list(ctx: &Context, login: &str) -> Result<(), Box<dyn std::error::Error>> {
    let user = ctx.user(login).await?;
    let incoming = ctx.invites.incoming_to(&user.id).await;
    let outgoing = ctx.invites.outgoing_from(&user.id).await;

    if incoming.is_empty() && outgoing.is_empty() {
        println!("No pending invites for '{}'.", login);
        return Ok(());
    }

    println!("Incoming:");
    for invite in &incoming {
        let from = ctx.store.get_user_by_id(&invite.from_user_id).await?;
        println!(
            "  {:>6}  from {:<20} {}",
            invite.id,
            from.login,
            invite.created_at.to_rfc3339()
        );
    }
    println!("Outgoing:");
    for invite in &outgoing {
        let to = ctx.store.get_user_by_id(&invite.to_user_id).await?;
        println!(
            "  {:>6}  to   {:<20} {}",
            invite.id,
            to.login,
            invite.created_at.to_rfc3339()
        );
    }
    Ok(())
}

pub async fn cmd_invite_revoke(
    ctx: &Context,
    from: &str,
    to: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let sender = ctx.user(from).await?;
    let recipient = ctx.user(to).await?;

    ctx.invites.revoke(&sender.id, &recipient.id).await?;

    println!("✓ Invite from '{}' to '{}' revoked", from, to);
    Ok(())
}

pub async fn cmd_invite_purge(
    ctx: &Context,
    older_than_hours: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    if older_than_hours < 0 {
        return Err("--older-than-hours must not be negative".into());
    }
    let cutoff = Utc::now() - Duration::hours(older_than_hours);
    let removed = ctx.invites.purge_older_than(cutoff).await?;

    tracing::info!(removed, %cutoff, "purged stale invites");
    println!("✓ Removed {} invite(s) created before {}", removed, cutoff.to_rfc3339());
    Ok(())
}
