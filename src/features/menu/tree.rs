//! Rebuilding the category forest from flat rows.
//!
//! Both views go through [`assemble`], so the management and public trees
//! always have the same shape; they only differ in the per-node projection.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use crate::features::menu::dtos::{
    CategoryTreeDto, ItemResponseDto, PublicCategoryDto, PublicMenuItemDto,
};
use crate::features::menu::models::{CategoryWithItems, MenuCategory};

/// Management view: every field of categories and items
pub fn build_management_tree(rows: Vec<CategoryWithItems>) -> Vec<CategoryTreeDto> {
    assemble(
        rows,
        |row: CategoryWithItems| {
            let items = row.items.into_iter().map(ItemResponseDto::from).collect();
            CategoryTreeDto::leaf(row.category, items)
        },
        |parent: &mut CategoryTreeDto, child| parent.children.push(child),
    )
}

/// Guest view: names, descriptions, prices and availability only
pub fn build_public_tree(rows: Vec<CategoryWithItems>) -> Vec<PublicCategoryDto> {
    assemble(
        rows,
        |row: CategoryWithItems| {
            let items = row.items.into_iter().map(PublicMenuItemDto::from).collect();
            PublicCategoryDto::leaf(row.category, items)
        },
        |parent: &mut PublicCategoryDto, child| parent.children.push(child),
    )
}

/// Link flat rows into a forest.
///
/// Rows are expected sorted by `display_order`; children keep arrival order.
/// A row whose parent is missing from `rows` (or is itself) becomes a root.
fn assemble<N>(
    rows: Vec<CategoryWithItems>,
    project: impl Fn(CategoryWithItems) -> N,
    push_child: impl Fn(&mut N, N),
) -> Vec<N> {
    // First pass: arena + id index
    let index: HashMap<Uuid, usize> = rows
        .iter()
        .enumerate()
        .map(|(position, row)| (row.category.id, position))
        .collect();

    let parents: Vec<Option<usize>> = rows
        .iter()
        .enumerate()
        .map(|(position, row)| {
            row.category
                .parent_id
                .and_then(|parent_id| index.get(&parent_id).copied())
                .filter(|&parent| parent != position)
        })
        .collect();

    let mut arena: Vec<Option<N>> = rows.into_iter().map(|row| Some(project(row))).collect();

    // Second pass: link
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];
    let mut roots = Vec::new();
    for (position, parent) in parents.iter().enumerate() {
        match parent {
            Some(parent) => children[*parent].push(position),
            None => roots.push(position),
        }
    }

    let mut forest = Vec::with_capacity(roots.len());
    for root in roots {
        if let Some(node) = detach(root, &mut arena, &children, &push_child) {
            forest.push(node);
        }
    }

    // Rows stuck in a parent cycle are unreachable from any root; surface them as roots
    for position in 0..arena.len() {
        if let Some(node) = detach(position, &mut arena, &children, &push_child) {
            forest.push(node);
        }
    }

    forest
}

fn detach<N>(
    position: usize,
    arena: &mut [Option<N>],
    children: &[Vec<usize>],
    push_child: &impl Fn(&mut N, N),
) -> Option<N> {
    let mut node = arena[position].take()?;
    for &child in &children[position] {
        if let Some(child) = detach(child, arena, children, push_child) {
            push_child(&mut node, child);
        }
    }
    Some(node)
}

/// All transitive children of `root` (excluding `root`), breadth-first
pub fn descendant_ids(categories: &[MenuCategory], root: Uuid) -> HashSet<Uuid> {
    let mut children_of: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for category in categories {
        if let Some(parent_id) = category.parent_id {
            children_of.entry(parent_id).or_default().push(category.id);
        }
    }

    let mut descendants = HashSet::new();
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for &child in children_of.get(&current).into_iter().flatten() {
            if child != root && descendants.insert(child) {
                queue.push_back(child);
            }
        }
    }

    descendants
}

/// `id` followed by its parent chain up to a root; stops early on a cycle
pub fn ancestor_chain(categories: &[MenuCategory], id: Uuid) -> Vec<&MenuCategory> {
    let by_id: HashMap<Uuid, &MenuCategory> = categories.iter().map(|c| (c.id, c)).collect();

    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(id);
    while let Some(current) = next.filter(|current| seen.insert(*current)) {
        let Some(&category) = by_id.get(&current) else {
            break;
        };
        chain.push(category);
        next = category.parent_id;
    }

    chain
}
