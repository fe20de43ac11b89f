//! Walks one request from submission to close against a scratch database.
//!
//! Pass a TOML config path to use its settings; the database always lands in
//! a temporary directory.
use inventory_requests::{
    Actor, LineAction, RequestService, Role, SaveMode, StoreTransition,
    catalog::{CatalogItem, Reference},
    config::ServiceConfig,
    logging,
};
use std::path::Path;

fn main() -> anyhow::Result<()> {
    logging::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServiceConfig::load(Path::new(&path))?,
        None => ServiceConfig::default(),
    };
    let dir = tempfile::tempdir()?;
    let config = config.set_db_path(dir.path().join("requests.db"));
    let store_dept = config.store_department.clone();
    let service = RequestService::open(config)?;

    let store = service.store();
    store.put_item(
        &CatalogItem::new("HSE-001")
            .set_name("Safety gloves")
            .set_owner_dept("HSE")
            .set_unit("PR")
            .set_qty(40),
    )?;
    store.put_item(
        &CatalogItem::new("IT-014")
            .set_name("Label printer tape")
            .set_owner_dept("IT")
            .set_unit("PCS")
            .set_qty(12),
    )?;
    store.put_project(&Reference::new("p-100", "North Yard"))?;
    store.put_engineer(&Reference::new("e-7", "Omar Haddad"))?;

    let requester = Actor::new("req-1")
        .set_full_name("Rana Saleh")
        .with_role(Role::Requester)
        .add_department("TRP");
    let hse = Actor::new("mgr-hse")
        .set_full_name("Hadi")
        .with_role(Role::DeptManager)
        .add_department("HSE");
    let it = Actor::new("mgr-it")
        .set_full_name("Ines")
        .with_role(Role::DeptManager)
        .add_department("IT");
    let storekeeper = Actor::new("store-1")
        .set_full_name("Sami")
        .add_department(&store_dept);

    // Requester fills in and submits
    let catalog = store.catalog()?;
    let mut editor = service.new_editor(requester);
    editor.set_project("p-100")?;
    editor.set_engineer("e-7")?;
    editor.set_urgent(true)?;
    editor.add_line(&catalog, "HSE-001", "", 6)?;
    editor.add_line(&catalog, "IT-014", "", 2)?;
    editor.edit_note("Needed for the Monday shutdown")?;
    let mut doc = service.save(&mut editor, SaveMode::Submit)?;
    println!("submitted {} ({})", doc.rq_code, doc.status);

    // Each owning department signs off on its own lines
    for manager in [&hse, &it] {
        let keys: Vec<String> = doc
            .lines
            .iter()
            .filter(|line| manager.in_department(&line.owner_dept_id))
            .map(|line| line.key.clone())
            .collect();
        for key in keys {
            doc = service.apply_line_action(
                &doc.rq_code,
                doc.updated_at,
                manager,
                &key,
                LineAction::Approve,
            )?;
        }
        println!("{} approved, request is {}", manager.display_name(), doc.status);
    }

    // The store prepares and hands out; an owning manager closes
    for (actor, transition) in [
        (&storekeeper, StoreTransition::StartPreparing),
        (&storekeeper, StoreTransition::MarkReady),
        (&hse, StoreTransition::Close),
    ] {
        doc = service.transition(&doc.rq_code, doc.updated_at, actor, transition)?;
        println!("{} -> {}", transition.summary(), doc.status);
    }

    for id in ["HSE-001", "IT-014"] {
        if let Some(item) = store.item(id)? {
            println!("{id} left in stock: {:?}", item.qty);
        }
    }

    println!("\nactivity (newest first):");
    for entry in doc.activity_log.entries() {
        println!("- {} [{}]", entry.summary, entry.actor.label());
        for detail in entry.details.lines() {
            println!("    {detail}");
        }
    }

    service.flush()?;
    Ok(())
}
