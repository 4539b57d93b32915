//! `fb order` handlers: show, list, act.

use anyhow::{Context, Result};
use fb_schemas::{micros_to_price, price_to_micros, Order, OrderFilter};
use fb_workflow::{Action, ActionKind, OrderView, ResidualOutcome, TransitionOutcome};

use super::{connect, join_statuses, parse_status};

// ---------------------------------------------------------------------------
// order show
// ---------------------------------------------------------------------------

pub async fn show(config_paths: &[String], role: Option<&str>, id: &str) -> Result<()> {
    let c = connect(config_paths, role)?;
    let view = c.gateway.view(&c.session, id).await?;
    print_view(&view);
    Ok(())
}

fn print_view(v: &OrderView) {
    let o = &v.order;
    println!("order_id={}", o.id);
    println!("status={} code={} terminal={}", v.status_name, v.status_code, v.terminal);
    println!("label={}", v.status_label);
    println!("direction={:?}", o.order_direction);
    println!("security_id={} type={:?}", o.security_id, o.security_type);
    println!("market={:?}", o.market());
    println!("quantity={}", o.quantity);
    println!(
        "price_limits={}..{}",
        opt_price(o.price_limit_min),
        opt_price(o.price_limit_max)
    );
    if let Some(q) = o.validated_quantity {
        println!("validated_quantity={}", q);
    }
    if let Some(p) = o.validated_price {
        println!("validated_price={}", micros_to_price(p));
    }
    println!("investor_id={}", o.investor_id);
    println!("card_payment={}", v.card_payment);
    println!("role={}", v.role);
    println!("actions={}", join_actions(&v.actions));
}

fn opt_price(p: Option<i64>) -> String {
    p.map(|m| micros_to_price(m).to_string()).unwrap_or_default()
}

fn join_actions(actions: &[ActionKind]) -> String {
    actions
        .iter()
        .map(|a| a.wire_name())
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// order list
// ---------------------------------------------------------------------------

pub async fn list(
    config_paths: &[String],
    role: Option<&str>,
    statuses: &[String],
    investor_id: Option<String>,
    negotiator_id: Option<String>,
) -> Result<()> {
    let statuses = statuses
        .iter()
        .map(|s| parse_status(s))
        .collect::<Result<Vec<_>>>()?;
    let filter = OrderFilter {
        statuses,
        investor_id,
        negotiator_id,
    };

    let c = connect(config_paths, role)?;
    let views = c.gateway.list(&c.session, &filter).await?;
    for v in &views {
        println!(
            "order_id={} status={} quantity={} security_id={} actions={}",
            v.order.id,
            v.order.order_status,
            v.order.quantity,
            v.order.security_id,
            join_actions(&v.actions)
        );
    }
    println!("count={}", views.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// order act
// ---------------------------------------------------------------------------

pub struct ActArgs {
    pub id: String,
    pub action: String,
    pub quantity: Option<u64>,
    pub price: Option<f64>,
    pub motif: Option<String>,
}

/// Turn the command-line fields into an [`Action`].
pub fn build_action(args: &ActArgs) -> Result<Action> {
    let kind = ActionKind::parse(&args.action).with_context(|| {
        format!(
            "invalid --action '{}'. expected one of: submit | validate | partial | reject | cancel | expire",
            args.action
        )
    })?;
    let price = args.price.map(price_to_micros).transpose()?;
    Action::from_parts(kind, args.quantity, price, args.motif.clone())
        .context("--quantity is required for a partial validation")
}

pub async fn act(config_paths: &[String], role: Option<&str>, args: ActArgs) -> Result<()> {
    let action = build_action(&args)?;
    let c = connect(config_paths, role)?;

    // Plan against the backend's current copy, not a cached one.
    let order: Order = c.gateway.refresh(&c.session, &args.id).await?;
    let out = c
        .gateway
        .request_transition(&c.session, &order, &action)
        .await?;
    print_outcome(&out);
    Ok(())
}

fn print_outcome(out: &TransitionOutcome) {
    println!(
        "transitioned=true order_id={} role={} action={} from={} to={}",
        out.order_id,
        out.role,
        out.action.wire_name(),
        out.from,
        out.to
    );
    if let Some(o) = &out.order {
        println!("current_status={}", o.order_status);
    }
    match &out.residual {
        None => {}
        Some(ResidualOutcome::CreatedByBackend { order_id })
        | Some(ResidualOutcome::Created { order_id }) => {
            println!("residual_order_id={}", order_id);
        }
        Some(ResidualOutcome::Pending {
            parent_order_id,
            quantity,
            error,
        }) => {
            eprintln!(
                "WARN: RESIDUAL_PENDING parent={} quantity={} error={}",
                parent_order_id, quantity, error
            );
            eprintln!("  retry with: fb residual retry --parent {}", parent_order_id);
        }
    }
}
