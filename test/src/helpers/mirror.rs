use shadow_objects_kernel::Kernel;
use shadow_objects_shared::Uuid;
use shadow_objects_view::ComponentContext;

/// Checks that `kernel` mirrors every live component of `context`: same
/// roots, and per component the same token, parent, order, children and
/// remembered properties.
///
/// Siblings with equal order may sit in a different relative position on
/// each side, so children are compared as sets plus their sort order.
pub fn verify_mirror(context: &ComponentContext, kernel: &Kernel) -> Result<(), String> {
    let view_order = context
        .traverse_level_order_bfs()
        .map_err(|error| error.to_string())?;

    if view_order.len() != kernel.len() {
        return Err(format!(
            "View has {} component(s), kernel has {} entities",
            view_order.len(),
            kernel.len()
        ));
    }
    same_members("root", &context.root_uuids(), &kernel.root_uuids())?;

    for uuid in &view_order {
        let entity = kernel
            .entity(uuid)
            .ok_or_else(|| format!("Entity {} missing from kernel", uuid))?;
        let token = context.token(uuid).map_err(|error| error.to_string())?;
        let order = context.order(uuid).map_err(|error| error.to_string())?;
        let parent_uuid = context.parent_uuid(uuid).map_err(|error| error.to_string())?;
        let children = context.children(uuid).map_err(|error| error.to_string())?;

        if entity.token() != token {
            return Err(format!("Entity {} has token {}, view has {}", uuid, entity.token(), token));
        }
        if entity.order() != order {
            return Err(format!("Entity {} has order {}, view has {}", uuid, entity.order(), order));
        }
        if entity.parent_uuid() != parent_uuid {
            return Err(format!(
                "Entity {} has parent {:?}, view has {:?}",
                uuid,
                entity.parent_uuid(),
                parent_uuid
            ));
        }

        let entity_children = entity.children();
        same_members(&uuid.to_string(), &children, &entity_children)?;
        sorted_by_order(context, &entity_children)?;

        if let Some(remembered) = context.remembered(uuid) {
            for (key, value) in &remembered.properties {
                if entity.property(key).as_ref() != Some(value) {
                    return Err(format!(
                        "Entity {} property {} is {:?}, view remembers {:?}",
                        uuid,
                        key,
                        entity.property(key),
                        value
                    ));
                }
            }
        }
    }

    Ok(())
}

fn same_members(what: &str, view: &[Uuid], kernel: &[Uuid]) -> Result<(), String> {
    let mut view = view.to_vec();
    let mut kernel = kernel.to_vec();
    view.sort();
    kernel.sort();
    if view != kernel {
        return Err(format!("Children of {} differ: view {:?}, kernel {:?}", what, view, kernel));
    }
    Ok(())
}

fn sorted_by_order(context: &ComponentContext, uuids: &[Uuid]) -> Result<(), String> {
    let orders = uuids
        .iter()
        .map(|uuid| context.order(uuid).map_err(|error| error.to_string()))
        .collect::<Result<Vec<i32>, String>>()?;
    if orders.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(format!("Children {:?} not sorted by order {:?}", uuids, orders));
    }
    Ok(())
}
