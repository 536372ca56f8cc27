mod common;

use common::{FlakyPartition, dn, entry, mem_partition, norm, registry, running_nexus};
use dirdb_nexus::pipeline::OperationOutcome;
use dirdb_nexus::{NexusConfig, PartitionNexus, Stage};
use dirdb_types::dn::Dn;
use dirdb_types::error::DirectoryError;
use dirdb_types::ops::{AttributeSelection, DirectoryOperation, Filter, SearchScope};
use dirdb_types::value::Value;

fn naming_contexts(nexus: &PartitionNexus) -> Vec<String> {
    nexus
        .root_dse()
        .get("namingContexts")
        .map(|attr| attr.values().iter().map(ToString::to_string).collect())
        .unwrap_or_default()
}

#[test]
fn resolves_by_longest_registered_suffix() {
    let nexus = running_nexus(vec![mem_partition("example", "dc=example,dc=com")]);

    let resolved = nexus.get_partition(&dn("cn=x,ou=users,ou=system")).unwrap();
    assert_eq!(resolved.id(), "system");

    let resolved = nexus
        .get_partition(&dn("uid=y,ou=people,dc=example,dc=com"))
        .unwrap();
    assert_eq!(resolved.id(), "example");

    let err = nexus.get_partition(&dn("dc=elsewhere")).unwrap_err();
    assert!(matches!(err, DirectoryError::NameNotFound { .. }));
}

#[test]
fn duplicate_suffix_leaves_topology_unchanged() {
    let nexus = running_nexus(vec![]);
    let before_contexts = naming_contexts(&nexus);

    let err = nexus
        .add_partition(mem_partition("impostor", "ou=system"))
        .unwrap_err();
    assert!(matches!(err, DirectoryError::Configuration { .. }));

    let suffixes = nexus.list_suffixes();
    assert_eq!(suffixes, vec![norm("ou=system")]);
    assert_eq!(naming_contexts(&nexus), before_contexts);
    assert_eq!(
        nexus.get_partition(&dn("ou=system")).unwrap().id(),
        "system"
    );
}

#[test]
fn naming_contexts_mirror_registered_partitions() {
    let nexus = running_nexus(vec![]);
    assert_eq!(naming_contexts(&nexus), vec!["ou=system".to_string()]);

    nexus
        .add_partition(mem_partition("example", "dc=Example,dc=Com"))
        .unwrap();
    // The user-provided form is advertised, not the normalized one.
    assert_eq!(
        naming_contexts(&nexus),
        vec!["ou=system".to_string(), "dc=Example,dc=Com".to_string()]
    );

    nexus.remove_partition(&norm("dc=example,dc=com")).unwrap();
    assert_eq!(naming_contexts(&nexus), vec!["ou=system".to_string()]);

    // A failed registration leaves the mirror intact.
    let _ = nexus.add_partition(FlakyPartition::failing_init("bad", "dc=bad"));
    assert_eq!(naming_contexts(&nexus), vec!["ou=system".to_string()]);
}

#[test]
fn init_rolls_back_every_partition_on_failure() {
    test_helpers::maybe_start_logging();
    let nexus = PartitionNexus::new(registry());
    let err = nexus
        .init(NexusConfig {
            system_partition: mem_partition("system", "ou=system"),
            partitions: vec![
                mem_partition("example", "dc=example,dc=com"),
                FlakyPartition::failing_init("bad", "dc=bad"),
                mem_partition("other", "dc=other"),
            ],
        })
        .unwrap_err();
    assert!(matches!(err, DirectoryError::Configuration { .. }));

    assert!(nexus.list_suffixes().is_empty());
    assert!(naming_contexts(&nexus).is_empty());
    assert!(nexus.resolve(&norm("ou=system")).is_none());
    assert!(nexus.resolve(&norm("dc=example,dc=com")).is_none());
    assert_eq!(nexus.stage(), Stage::Created);
}

#[test]
fn add_partition_init_failure_leaves_no_trace() {
    let nexus = running_nexus(vec![]);
    let err = nexus
        .add_partition(FlakyPartition::failing_init("bad", "dc=bad"))
        .unwrap_err();
    assert!(matches!(err, DirectoryError::Configuration { .. }));
    assert!(nexus.resolve(&norm("dc=bad")).is_none());
    assert_eq!(nexus.list_suffixes(), vec![norm("ou=system")]);

    // The suffix is free again afterwards.
    nexus.add_partition(mem_partition("good", "dc=bad")).unwrap();
    assert_eq!(nexus.resolve(&norm("dc=bad")).unwrap().id(), "good");
}

#[test]
fn system_partition_suffix_is_mandatory() {
    test_helpers::maybe_start_logging();
    let nexus = PartitionNexus::new(registry());
    let err = nexus
        .init(NexusConfig {
            system_partition: mem_partition("system", "dc=example"),
            partitions: vec![],
        })
        .unwrap_err();
    assert!(matches!(err, DirectoryError::Configuration { .. }));
    assert!(!nexus.is_running());
}

#[test]
fn remove_unknown_suffix_is_name_not_found() {
    let nexus = running_nexus(vec![]);
    let err = nexus.remove_partition(&norm("dc=nowhere")).unwrap_err();
    assert!(matches!(err, DirectoryError::NameNotFound { .. }));
}

#[test]
fn removed_partition_is_destroyed_and_unroutable() {
    let nexus = running_nexus(vec![mem_partition("example", "dc=example,dc=com")]);
    let partition = nexus.get_partition(&dn("dc=example,dc=com")).unwrap();
    assert!(partition.is_initialized());

    nexus.remove_partition(&norm("dc=example,dc=com")).unwrap();
    assert!(!partition.is_initialized());
    assert!(nexus.resolve(&norm("cn=x,dc=example,dc=com")).is_none());
    // The surviving partition still routes.
    assert_eq!(
        nexus.get_partition(&dn("cn=x,ou=system")).unwrap().id(),
        "system"
    );
}

#[test]
fn destroy_is_best_effort_across_failures() {
    let nexus = running_nexus(vec![]);
    nexus
        .add_partition(FlakyPartition::failing_destroy("stubborn", "dc=stubborn"))
        .unwrap();
    let survivor = nexus.get_partition(&dn("ou=system")).unwrap();

    nexus.destroy();

    // The failing partition did not abort teardown of the rest.
    assert!(!survivor.is_initialized());
    assert!(nexus.list_suffixes().is_empty());
    assert!(naming_contexts(&nexus).is_empty());
    assert_eq!(nexus.stage(), Stage::Stopped);
}

#[test]
fn cross_partition_move_is_rejected_without_side_effects() {
    let nexus = running_nexus(vec![mem_partition("example", "dc=example,dc=com")]);
    let system = nexus.get_partition(&dn("ou=system")).unwrap();
    let example = nexus.get_partition(&dn("dc=example,dc=com")).unwrap();
    system
        .add(entry("cn=moving,ou=system", &[("cn", "moving")]))
        .unwrap();

    let err = nexus
        .execute(&DirectoryOperation::Move {
            dn: dn("cn=moving,ou=system"),
            new_parent: dn("dc=example,dc=com"),
        })
        .unwrap_err();
    assert!(matches!(err, DirectoryError::AffectsMultipleStores { .. }));

    // Neither partition's data changed.
    assert!(system.has_entry(&dn("cn=moving,ou=system")).unwrap());
    assert!(!example
        .has_entry(&dn("cn=moving,dc=example,dc=com"))
        .unwrap());

    let err = nexus
        .execute(&DirectoryOperation::MoveAndRename {
            dn: dn("cn=moving,ou=system"),
            new_parent: dn("dc=example,dc=com"),
            new_rdn: dirdb_types::dn::Rdn::single("cn", "moved"),
            delete_old_rdn: true,
        })
        .unwrap_err();
    assert!(matches!(err, DirectoryError::AffectsMultipleStores { .. }));
}

#[test]
fn dispatch_forwards_partition_errors_unchanged() {
    let nexus = running_nexus(vec![]);
    let err = nexus
        .execute(&DirectoryOperation::Delete {
            dn: dn("cn=ghost,ou=system"),
        })
        .unwrap_err();
    assert!(matches!(err, DirectoryError::NameNotFound { .. }));
}

#[test]
fn compare_direct_and_normalized_matching() {
    let nexus = running_nexus(vec![]);
    let system = nexus.get_partition(&dn("ou=system")).unwrap();
    system
        .add(entry(
            "cn=alice,ou=system",
            &[("cn", "Alice"), ("userPassword", "secret")],
        ))
        .unwrap();
    let alice = dn("cn=alice,ou=system");

    // Direct match.
    assert!(nexus.compare(&alice, "cn", &Value::text("Alice")).unwrap());
    // Normalized match: case and whitespace fold away.
    assert!(nexus.compare(&alice, "cn", &Value::text("  ALICE ")).unwrap());
    assert!(!nexus.compare(&alice, "cn", &Value::text("bob")).unwrap());
    // Alias resolves to the same attribute.
    assert!(nexus
        .compare(&alice, "commonName", &Value::text("alice"))
        .unwrap());
    // Binary against stored text, via UTF-8 conversion.
    assert!(nexus
        .compare(&alice, "userPassword", &Value::binary(*b"secret"))
        .unwrap());
}

#[test]
fn compare_error_kinds() {
    let nexus = running_nexus(vec![]);
    let system = nexus.get_partition(&dn("ou=system")).unwrap();
    system
        .add(entry("cn=alice,ou=system", &[("cn", "alice")]))
        .unwrap();
    let alice = dn("cn=alice,ou=system");

    let err = nexus
        .compare(&alice, "noSuchType", &Value::text("x"))
        .unwrap_err();
    assert!(matches!(err, DirectoryError::InvalidAttributeIdentifier { .. }));

    let err = nexus.compare(&alice, "sn", &Value::text("x")).unwrap_err();
    assert!(matches!(err, DirectoryError::NoSuchAttribute { .. }));
}

#[test]
fn compare_against_root_dse() {
    let nexus = running_nexus(vec![]);
    assert!(nexus
        .compare(&Dn::root(), "vendorName", &Value::text("dirdb"))
        .unwrap());
    assert!(!nexus
        .compare(&Dn::root(), "vendorName", &Value::text("someone else"))
        .unwrap());
}

#[test]
fn matched_name_tracks_live_entries() {
    let nexus = running_nexus(vec![]);
    let system = nexus.get_partition(&dn("ou=system")).unwrap();
    system
        .add(entry("ou=users,ou=system", &[("ou", "users")]))
        .unwrap();

    let matched = nexus
        .get_matched_name(&dn("cn=ghost,ou=users,ou=system"))
        .unwrap();
    assert_eq!(matched, dn("ou=users,ou=system"));

    let matched = nexus
        .get_matched_name(&dn("cn=a,ou=nowhere,ou=system"))
        .unwrap();
    assert_eq!(matched, dn("ou=system"));

    // Nothing matches outside every partition.
    let matched = nexus.get_matched_name(&dn("dc=unrouted")).unwrap();
    assert!(matched.is_empty());
}

#[test]
fn root_dse_lookup_and_idempotence() {
    let nexus = running_nexus(vec![]);
    let op = DirectoryOperation::Lookup {
        dn: Dn::root(),
        attrs: AttributeSelection::All,
    };
    let OperationOutcome::Entry(first) = nexus.execute(&op).unwrap() else {
        panic!("expected an entry");
    };
    let OperationOutcome::Entry(mut second) = nexus.execute(&op).unwrap() else {
        panic!("expected an entry");
    };
    assert_eq!(first, second);

    // Mutating one clone affects neither the other nor the canonical entry.
    second.remove("vendorName");
    assert!(first.has_attribute("vendorName"));
    assert!(nexus.root_dse().has_attribute("vendorName"));
}

#[test]
fn root_dse_search_with_no_attributes_marker() {
    let nexus = running_nexus(vec![]);
    let outcome = nexus
        .execute(&DirectoryOperation::Search {
            base: Dn::root(),
            scope: SearchScope::Object,
            filter: Filter::present("objectClass"),
            attrs: AttributeSelection::ids(["1.1"]),
        })
        .unwrap();
    let OperationOutcome::Entries(entries) = outcome else {
        panic!("expected entries");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attribute_count(), 0);
}

#[test]
fn root_dse_search_with_named_attributes() {
    let nexus = running_nexus(vec![]);
    let outcome = nexus
        .execute(&DirectoryOperation::Search {
            base: Dn::root(),
            scope: SearchScope::Object,
            filter: Filter::present("objectclass"),
            attrs: AttributeSelection::ids(["namingContexts", "vendorName"]),
        })
        .unwrap();
    let OperationOutcome::Entries(entries) = outcome else {
        panic!("expected entries");
    };
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.attribute_count(), 2);
    assert_eq!(
        entry.get("vendorName").unwrap().values(),
        &[Value::text("dirdb")]
    );
    assert_eq!(
        entry.get("namingContexts").unwrap().values(),
        &[Value::text("ou=system")]
    );
}

#[test]
fn root_dse_search_rejects_other_shapes() {
    let nexus = running_nexus(vec![]);
    // Wrong scope.
    let err = nexus
        .execute(&DirectoryOperation::Search {
            base: Dn::root(),
            scope: SearchScope::Subtree,
            filter: Filter::present("objectClass"),
            attrs: AttributeSelection::All,
        })
        .unwrap_err();
    assert!(matches!(err, DirectoryError::NameNotFound { .. }));

    // Wrong filter.
    let err = nexus
        .execute(&DirectoryOperation::Search {
            base: Dn::root(),
            scope: SearchScope::Object,
            filter: Filter::present("cn"),
            attrs: AttributeSelection::All,
        })
        .unwrap_err();
    assert!(matches!(err, DirectoryError::NameNotFound { .. }));
}

#[test]
fn root_dse_is_read_only() {
    let nexus = running_nexus(vec![]);
    let mutations = [
        DirectoryOperation::Add {
            entry: dirdb_types::entry::Entry::new(Dn::root()),
        },
        DirectoryOperation::Delete { dn: Dn::root() },
        DirectoryOperation::Modify {
            dn: Dn::root(),
            mods: vec![],
        },
        DirectoryOperation::Rename {
            dn: Dn::root(),
            new_rdn: dirdb_types::dn::Rdn::single("cn", "x"),
            delete_old_rdn: false,
        },
        DirectoryOperation::Move {
            dn: Dn::root(),
            new_parent: dn("ou=system"),
        },
    ];
    for op in mutations {
        let err = nexus.execute(&op).unwrap_err();
        assert!(
            matches!(err, DirectoryError::UnsupportedOperation { .. }),
            "{op:?} should be rejected"
        );
    }
}

#[test]
fn root_dse_existence_and_session_edges() {
    let nexus = running_nexus(vec![]);
    assert_eq!(
        nexus
            .execute(&DirectoryOperation::HasEntry { dn: Dn::root() })
            .unwrap(),
        OperationOutcome::Bool(true)
    );
    assert_eq!(
        nexus
            .execute(&DirectoryOperation::Unbind { dn: Dn::root() })
            .unwrap(),
        OperationOutcome::Done
    );
    for op in [
        DirectoryOperation::List { dn: Dn::root() },
        DirectoryOperation::Bind {
            dn: Dn::root(),
            credentials: b"secret".to_vec(),
        },
    ] {
        let err = nexus.execute(&op).unwrap_err();
        assert!(matches!(err, DirectoryError::NameNotFound { .. }));
    }
}

#[test]
fn register_supported_oids() {
    let nexus = running_nexus(vec![]);
    nexus.register_extensions(&["1.3.6.1.4.1.4203.1.11.1".to_string()]);
    nexus.register_sasl_mechanisms(&["GSSAPI".to_string()]);
    let dse = nexus.root_dse();
    assert!(dse
        .get("supportedExtension")
        .unwrap()
        .contains(&Value::text("1.3.6.1.4.1.4203.1.11.1")));
    assert!(dse
        .get("supportedSASLMechanisms")
        .unwrap()
        .contains(&Value::text("GSSAPI")));
}

#[test]
fn system_partition_handle() {
    let nexus = running_nexus(vec![mem_partition("example", "dc=example,dc=com")]);
    let system = nexus.system_partition().unwrap();
    assert_eq!(system.id(), "system");
    assert_eq!(system.suffix_dn(), &norm("ou=system"));
}

#[test]
fn search_through_dispatch_projects_attributes() {
    let nexus = running_nexus(vec![]);
    let system = nexus.get_partition(&dn("ou=system")).unwrap();
    system
        .add(entry(
            "cn=alice,ou=system",
            &[("cn", "alice"), ("description", "admin")],
        ))
        .unwrap();

    let outcome = nexus
        .execute(&DirectoryOperation::Search {
            base: dn("ou=system"),
            scope: SearchScope::Subtree,
            filter: Filter::equality("cn", "alice"),
            attrs: AttributeSelection::ids(["cn"]),
        })
        .unwrap();
    let OperationOutcome::Entries(entries) = outcome else {
        panic!("expected entries");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attribute_count(), 1);
    assert!(entries[0].has_attribute("cn"));
}
