mod delegates;
mod expressions;
mod library;
mod many_to_many;

pub use delegates::*;
pub use expressions::*;
pub use library::*;
pub use many_to_many::*;

use indoc::indoc;

/// A schema document together with the DDL creating its tables.
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    pub schema: &'static str,
    pub ddl: &'static str,
}

/// Users and their posts. Posts are visible when published or to their
/// author, and only the author may change or delete them. Published posts
/// cannot be deleted, and an update must leave the post with its author.
pub fn blog() -> Fixture {
    let schema = indoc! {r#"
        {
          "provider": "sqlite",
          "authType": "User",
          "models": {
            "User": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "email": { "type": "String", "unique": true },
                "name": { "type": "String", "optional": true },
                "posts": { "type": "Post", "array": true, "relation": { "opposite": "author" } }
              },
              "policies": [
                {
                  "kind": "allow",
                  "operations": ["create", "read"],
                  "condition": { "kind": "literal", "value": true }
                },
                {
                  "kind": "allow",
                  "operations": ["update", "delete"],
                  "condition": {
                    "kind": "binary",
                    "op": "==",
                    "left": { "kind": "member", "receiver": { "kind": "auth" }, "member": "id" },
                    "right": { "kind": "field", "name": "id" }
                  }
                }
              ]
            },
            "Post": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "title": { "type": "String" },
                "published": { "type": "Boolean", "default": false },
                "authorId": { "type": "Int" },
                "author": {
                  "type": "User",
                  "relation": { "fields": ["authorId"], "references": ["id"], "opposite": "posts", "onDelete": "Cascade" }
                },
                "updatedAt": { "type": "DateTime", "updatedAt": true }
              },
              "policies": [
                {
                  "kind": "allow",
                  "operations": ["create", "update", "post-update", "delete"],
                  "condition": {
                    "kind": "binary",
                    "op": "==",
                    "left": { "kind": "member", "receiver": { "kind": "auth" }, "member": "id" },
                    "right": { "kind": "field", "name": "authorId" }
                  }
                },
                {
                  "kind": "allow",
                  "operations": ["read"],
                  "condition": {
                    "kind": "binary",
                    "op": "||",
                    "left": {
                      "kind": "binary",
                      "op": "==",
                      "left": { "kind": "field", "name": "published" },
                      "right": { "kind": "literal", "value": true }
                    },
                    "right": {
                      "kind": "binary",
                      "op": "==",
                      "left": { "kind": "member", "receiver": { "kind": "auth" }, "member": "id" },
                      "right": { "kind": "field", "name": "authorId" }
                    }
                  }
                },
                {
                  "kind": "deny",
                  "operations": ["delete"],
                  "condition": { "kind": "field", "name": "published" }
                }
              ]
            }
          }
        }
    "#};

    let ddl = indoc! {r#"
        CREATE TABLE "User" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "email" TEXT NOT NULL UNIQUE,
            "name" TEXT
        );

        CREATE TABLE "Post" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "title" TEXT NOT NULL,
            "published" INTEGER NOT NULL DEFAULT 0,
            "authorId" INTEGER NOT NULL REFERENCES "User"("id") ON DELETE CASCADE,
            "updatedAt" TEXT NOT NULL
        );
    "#};

    Fixture { schema, ddl }
}

/// `Foo` rows may be created and read by anyone, and deleted once `x > 2`.
pub fn foo() -> Fixture {
    let schema = indoc! {r#"
        {
          "provider": "sqlite",
          "models": {
            "Foo": {
              "fields": {
                "id": { "type": "Int", "id": true },
                "x": { "type": "Int" }
              },
              "policies": [
                {
                  "kind": "allow",
                  "operations": ["create", "read"],
                  "condition": { "kind": "literal", "value": true }
                },
                {
                  "kind": "allow",
                  "operations": ["delete"],
                  "condition": {
                    "kind": "binary",
                    "op": ">",
                    "left": { "kind": "field", "name": "x" },
                    "right": { "kind": "literal", "value": 2 }
                  }
                }
              ]
            }
          }
        }
    "#};

    let ddl = indoc! {r#"
        CREATE TABLE "Foo" (
            "id" INTEGER PRIMARY KEY,
            "x" INTEGER NOT NULL
        );
    "#};

    Fixture { schema, ddl }
}

/// Notes can be created by anyone but only read by their owner. `Secret`
/// declares no rules at all.
pub fn notes() -> Fixture {
    let schema = indoc! {r#"
        {
          "provider": "sqlite",
          "models": {
            "Note": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "title": { "type": "String" },
                "ownerId": { "type": "Int", "optional": true }
              },
              "policies": [
                {
                  "kind": "allow",
                  "operations": ["create"],
                  "condition": { "kind": "literal", "value": true }
                },
                {
                  "kind": "allow",
                  "operations": ["read"],
                  "condition": {
                    "kind": "binary",
                    "op": "==",
                    "left": { "kind": "field", "name": "ownerId" },
                    "right": { "kind": "member", "receiver": { "kind": "auth" }, "member": "id" }
                  }
                }
              ]
            },
            "Secret": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "value": { "type": "String" }
              }
            }
          }
        }
    "#};

    let ddl = indoc! {r#"
        CREATE TABLE "Note" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "title" TEXT NOT NULL,
            "ownerId" INTEGER
        );

        CREATE TABLE "Secret" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "value" TEXT NOT NULL
        );
    "#};

    Fixture { schema, ddl }
}

/// One field of every scalar type, without access rules.
pub fn scalars() -> Fixture {
    let schema = indoc! {r#"
        {
          "provider": "sqlite",
          "models": {
            "Sample": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "label": { "type": "String", "unique": true },
                "quantity": { "type": "Int" },
                "big": { "type": "BigInt" },
                "ratio": { "type": "Float" },
                "price": { "type": "Decimal" },
                "active": { "type": "Boolean" },
                "bornAt": { "type": "DateTime" },
                "payload": { "type": "Bytes" },
                "meta": { "type": "Json" },
                "tags": { "type": "String", "array": true },
                "nickname": { "type": "String", "optional": true }
              }
            }
          }
        }
    "#};

    let ddl = indoc! {r#"
        CREATE TABLE "Sample" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "label" TEXT NOT NULL UNIQUE,
            "quantity" INTEGER NOT NULL,
            "big" INTEGER NOT NULL,
            "ratio" REAL NOT NULL,
            "price" TEXT NOT NULL,
            "active" INTEGER NOT NULL,
            "bornAt" TEXT NOT NULL,
            "payload" BLOB NOT NULL,
            "meta" TEXT NOT NULL,
            "tags" TEXT NOT NULL,
            "nickname" TEXT
        );
    "#};

    Fixture { schema, ddl }
}

/// `A` and `B` may only be read if the other side may be read.
pub fn cyclic_policies() -> &'static str {
    indoc! {r#"
        {
          "provider": "sqlite",
          "models": {
            "A": {
              "fields": {
                "id": { "type": "Int", "id": true },
                "bId": { "type": "Int", "unique": true },
                "b": { "type": "B", "relation": { "fields": ["bId"], "references": ["id"], "opposite": "a" } }
              },
              "policies": [
                {
                  "kind": "allow",
                  "operations": ["read"],
                  "condition": {
                    "kind": "call",
                    "function": "check",
                    "args": [{ "kind": "field", "name": "b" }, { "kind": "literal", "value": "read" }]
                  }
                }
              ]
            },
            "B": {
              "fields": {
                "id": { "type": "Int", "id": true },
                "a": { "type": "A", "optional": true, "relation": { "opposite": "b" } }
              },
              "policies": [
                {
                  "kind": "allow",
                  "operations": ["read"],
                  "condition": {
                    "kind": "call",
                    "function": "check",
                    "args": [{ "kind": "field", "name": "a" }, { "kind": "literal", "value": "read" }]
                  }
                }
              ]
            }
          }
        }
    "#}
}
