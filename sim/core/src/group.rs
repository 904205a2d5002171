//! Collision grouping: partition this tick's contacts into independent
//! clusters that can be resolved in isolation.
//!
//! Two robots belong to the same group when a chain of robot-robot
//! contacts connects them. Terrain is a shared sentinel that never merges
//! groups: two robots standing on the same ground but not touching each
//! other resolve independently. Groups come out ordered by their lowest
//! robot index and contacts keep detection order, so the partition is
//! deterministic for a given contact list.

use crate::collision::Contact;

/// One independent cluster of robots and the contacts among them.
#[derive(Debug)]
pub struct CollisionGroup {
    /// Robot indices in this group, ascending.
    pub robots: Vec<usize>,
    /// Contacts involving those robots, in detection order.
    pub contacts: Vec<Contact>,
}

/// Partition contacts into independent groups.
///
/// Returns the groups plus the indices of robots that appear in no
/// contact at all; those skip constraint resolution entirely.
#[must_use]
pub fn group_contacts(
    contacts: Vec<Contact>,
    robot_count: usize,
) -> (Vec<CollisionGroup>, Vec<usize>) {
    // Robot adjacency through robot-robot contacts only.
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); robot_count];
    let mut in_contact = vec![false; robot_count];
    for contact in &contacts {
        if let Some(r) = contact.robot_a {
            in_contact[r] = true;
        }
        if let Some(r) = contact.robot_b {
            in_contact[r] = true;
        }
        if let (Some(a), Some(b)) = (contact.robot_a, contact.robot_b) {
            if a != b {
                adjacency[a].push(b);
                adjacency[b].push(a);
            }
        }
    }

    // Flood fill connected components in robot index order.
    let mut group_of = vec![usize::MAX; robot_count];
    let mut groups: Vec<CollisionGroup> = Vec::new();
    let mut stack = Vec::new();
    for seed in 0..robot_count {
        if !in_contact[seed] || group_of[seed] != usize::MAX {
            continue;
        }
        let group_index = groups.len();
        let mut members = Vec::new();
        stack.push(seed);
        group_of[seed] = group_index;
        while let Some(robot) = stack.pop() {
            members.push(robot);
            for &neighbor in &adjacency[robot] {
                if group_of[neighbor] == usize::MAX {
                    group_of[neighbor] = group_index;
                    stack.push(neighbor);
                }
            }
        }
        members.sort_unstable();
        groups.push(CollisionGroup {
            robots: members,
            contacts: Vec::new(),
        });
    }

    for contact in contacts {
        // Both sides map to the same group by construction; terrain-only
        // contacts were filtered out during detection.
        let robot = contact.robot_a.or(contact.robot_b);
        if let Some(r) = robot {
            groups[group_of[r]].contacts.push(contact);
        }
    }

    let ungrouped = (0..robot_count).filter(|&r| !in_contact[r]).collect();
    (groups, ungrouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn contact(robot_a: Option<usize>, robot_b: Option<usize>) -> Contact {
        Contact {
            collidable_a: 0,
            collidable_b: 1,
            robot_a,
            robot_b,
            body_a: None,
            body_b: None,
            point: Vector3::zeros(),
            normal: Vector3::z(),
            depth: 1e-3,
            tangent1: Vector3::x(),
            tangent2: Vector3::y(),
        }
    }

    #[test]
    fn shared_terrain_does_not_merge_robots() {
        let contacts = vec![contact(Some(0), None), contact(Some(1), None)];
        let (groups, ungrouped) = group_contacts(contacts, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].robots, vec![0]);
        assert_eq!(groups[1].robots, vec![1]);
        assert!(ungrouped.is_empty());
    }

    #[test]
    fn contact_chain_merges_transitively() {
        // 0-1 touch, 1-2 touch, 3 stands on terrain alone, 4 is free.
        let contacts = vec![
            contact(Some(0), Some(1)),
            contact(Some(1), Some(2)),
            contact(Some(3), None),
        ];
        let (groups, ungrouped) = group_contacts(contacts, 5);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].robots, vec![0, 1, 2]);
        assert_eq!(groups[0].contacts.len(), 2);
        assert_eq!(groups[1].robots, vec![3]);
        assert_eq!(ungrouped, vec![4]);
    }

    #[test]
    fn no_contacts_means_everyone_ungrouped() {
        let (groups, ungrouped) = group_contacts(Vec::new(), 3);
        assert!(groups.is_empty());
        assert_eq!(ungrouped, vec![0, 1, 2]);
    }

    #[test]
    fn self_contact_forms_singleton_group() {
        let contacts = vec![contact(Some(2), Some(2))];
        let (groups, ungrouped) = group_contacts(contacts, 3);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].robots, vec![2]);
        assert_eq!(ungrouped, vec![0, 1]);
    }
}
